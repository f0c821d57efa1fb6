//! 单条客户端连接
//!
//! 连接状态机：
//!
//! ```text
//! Connected (未认证)
//!     │  auth 成功          │  table_auth 成功
//!     ▼                     ▼
//! Staff{restaurant_id}   Table{table_id, restaurant_id}
//!     │                     │
//!     └──────► Closed ◄─────┘   (断开 / 错误 / 心跳超时)
//! ```
//!
//! 未认证连接只能交换握手和心跳消息。

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use shared::message::{ClientMessage, ServerMessage};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::transport::Transport;
use crate::utils::AppResult;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport open, no role proven yet
    Connected,
    /// Staff dashboard for one tenant
    Staff { restaurant_id: i64 },
    /// Customer session bound to one table
    Table { table_id: i64, restaurant_id: i64 },
    Closed,
}

impl ConnectionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            ConnectionState::Staff { .. } | ConnectionState::Table { .. }
        )
    }
}

/// One live client connection, shared between its read loop, the
/// registries and the heartbeat sweep
pub struct Connection {
    pub id: Uuid,
    transport: Arc<dyn Transport>,
    state: Mutex<ConnectionState>,
    last_heartbeat: Mutex<Instant>,
    /// close() 触发；读循环对它 select，传输层读不返回也能退出
    closed: CancellationToken,
}

impl Connection {
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            transport,
            state: Mutex::new(ConnectionState::Connected),
            last_heartbeat: Mutex::new(Instant::now()),
            closed: CancellationToken::new(),
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Closed 是终态：关闭后任何状态写入都被丢弃，心跳巡检和
    /// 迟到的握手之间不会竞争出一个复活的连接
    pub fn set_state(&self, state: ConnectionState) {
        let mut guard = self.state.lock();
        if *guard == ConnectionState::Closed {
            return;
        }
        *guard = state;
    }

    /// Token the read loop races against its transport read
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    pub fn touch_heartbeat(&self) {
        *self.last_heartbeat.lock() = Instant::now();
    }

    pub fn heartbeat_elapsed(&self) -> Duration {
        self.last_heartbeat.lock().elapsed()
    }

    pub fn peer_addr(&self) -> Option<String> {
        self.transport.peer_addr()
    }

    pub async fn read(&self) -> AppResult<ClientMessage> {
        self.transport.read_message().await
    }

    /// Best-effort send; callers treat a failure as "connection gone"
    pub async fn send(&self, msg: &ServerMessage) -> AppResult<()> {
        self.transport.write_message(msg).await
    }

    /// Mark closed, cancel the read loop and shut the transport down.
    /// Idempotent.
    pub async fn close(&self) {
        let already_closed = {
            let mut state = self.state.lock();
            let closed = *state == ConnectionState::Closed;
            *state = ConnectionState::Closed;
            closed
        };
        self.closed.cancel();
        if !already_closed {
            let _ = self.transport.close().await;
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
