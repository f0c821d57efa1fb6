//! 实时连接管理器
//!
//! 负责接入新连接、驱动每条连接的读循环、定期心跳巡检。每条连接一个
//! tokio 任务；关闭令牌触发时所有读循环退出并注销连接。

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use shared::message::ServerMessage;

use super::connection::Connection;
use super::handler::{HandleOutcome, HandlerContext, handle_message};
use super::transport::{TcpTransport, Transport};
use crate::utils::AppError;

/// Accepts transports and runs their read loops
pub struct ConnectionManager {
    ctx: Arc<HandlerContext>,
    shutdown: CancellationToken,
    /// 心跳巡检周期
    sweep_interval: Duration,
    /// 超过该时长没有 ping 的已认证连接被回收
    heartbeat_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(
        ctx: Arc<HandlerContext>,
        sweep_interval: Duration,
        heartbeat_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            shutdown: CancellationToken::new(),
            sweep_interval,
            heartbeat_timeout,
        })
    }

    pub fn context(&self) -> &HandlerContext {
        &self.ctx
    }

    /// Accept loop. Returns when [`shutdown`](Self::shutdown) fires.
    pub async fn serve(self: &Arc<Self>, listener: TcpListener) {
        tracing::info!(
            addr = %listener.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            "Realtime server listening"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Realtime server shutting down");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            tracing::debug!(%addr, "Client connected");
                            self.attach(Arc::new(TcpTransport::from_stream(stream)));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                        }
                    }
                }
            }
        }
    }

    /// Register a transport and spawn its read loop. Used by the accept
    /// loop and directly by in-process tests.
    pub fn attach(self: &Arc<Self>, transport: Arc<dyn Transport>) -> Arc<Connection> {
        let conn = Connection::new(transport);
        let manager = self.clone();
        let handle = conn.clone();
        tokio::spawn(async move {
            manager.connection_loop(handle).await;
        });
        conn
    }

    async fn connection_loop(&self, conn: Arc<Connection>) {
        // 连接自己的关闭令牌也会终止循环：心跳巡检关掉一条 TCP 连接
        // 时，它的读可能还停在 socket 上
        let closed = conn.closed_token();
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = closed.cancelled() => break,
                read = conn.read() => match read {
                    Ok(msg) => {
                        if handle_message(&self.ctx, &conn, msg).await == HandleOutcome::Close {
                            tracing::debug!(conn_id = %conn.id, "Closing connection after protocol violation");
                            break;
                        }
                    }
                    // 坏帧：回错误，连接继续
                    Err(AppError::Invalid(reason)) => {
                        tracing::debug!(conn_id = %conn.id, %reason, "Malformed message");
                        if conn.send(&ServerMessage::error("Malformed message")).await.is_err() {
                            break;
                        }
                    }
                    Err(e) if e.is_disconnect() => {
                        tracing::debug!(conn_id = %conn.id, "Client disconnected");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(conn_id = %conn.id, error = %e, "Read failed");
                        break;
                    }
                }
            }
        }

        conn.close().await;
        self.ctx.registry.remove(&conn);
    }

    /// Periodic heartbeat sweep. Returns when shutdown fires.
    pub async fn run_heartbeat_sweep(self: &Arc<Self>) {
        let mut interval = tokio::time::interval(self.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => self.sweep_once().await,
            }
        }
    }

    /// Close every authenticated connection whose heartbeat lapsed
    pub async fn sweep_once(&self) {
        for conn in self.ctx.registry.authenticated_connections() {
            let elapsed = conn.heartbeat_elapsed();
            if elapsed > self.heartbeat_timeout {
                tracing::info!(
                    conn_id = %conn.id,
                    elapsed_secs = elapsed.as_secs(),
                    "Heartbeat timed out, dropping connection"
                );
                conn.close().await;
                self.ctx.registry.remove(&conn);
            }
        }
    }

    /// Stop the accept loop, the sweep, and all read loops
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
