//! 实时通道 (Realtime Channel)
//!
//! 员工端和桌台端通过一条持久双向连接与服务器交换带 `type` 标签的
//! JSON 消息。模块分工：
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │              ConnectionManager                   │
//! │   accept 循环 / 读循环 / 心跳巡检 / 关闭         │
//! └──────┬──────────────┬──────────────┬─────────────┘
//!        │              │              │
//!        ▼              ▼              ▼
//!    handler        Connection    ConnectionRegistry
//!   (消息分发)     (状态机+传输)  (租户/桌台分组 fan-out)
//!                       │
//!                       ▼
//!                   Transport (tcp / memory)
//! ```

pub mod connection;
pub mod handler;
pub mod manager;
pub mod registry;
pub mod transport;

pub use connection::{Connection, ConnectionState};
pub use handler::{HandleOutcome, HandlerContext, customer_status_message, handle_message};
pub use manager::ConnectionManager;
pub use registry::ConnectionRegistry;
pub use transport::{ClientHandle, MemoryTransport, TcpTransport, Transport};
