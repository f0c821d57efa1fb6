//! Memory 传输层实现 (同进程通信)
//!
//! 一对 mpsc 通道模拟客户端↔服务端的双向链路。测试里用
//! [`MemoryTransport::pair`] 拿到服务端传输和对应的客户端句柄，
//! 不需要真实 socket。

use async_trait::async_trait;
use shared::message::{ClientMessage, ServerMessage};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use super::Transport;
use crate::utils::{AppError, AppResult};

/// In-process server-side transport
pub struct MemoryTransport {
    incoming: Mutex<mpsc::UnboundedReceiver<ClientMessage>>,
    outgoing: parking_lot::Mutex<Option<mpsc::UnboundedSender<ServerMessage>>>,
    /// close() 信号走旁路令牌，绝不去抢 `incoming` 的锁 —— 读循环
    /// 可能正握着它停在 recv 上
    closed: CancellationToken,
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport").finish_non_exhaustive()
    }
}

/// The client end of a [`MemoryTransport::pair`]
pub struct ClientHandle {
    tx: mpsc::UnboundedSender<ClientMessage>,
    rx: Mutex<mpsc::UnboundedReceiver<ServerMessage>>,
}

impl MemoryTransport {
    /// Build a connected (server transport, client handle) pair
    pub fn pair() -> (std::sync::Arc<Self>, ClientHandle) {
        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();

        let transport = std::sync::Arc::new(Self {
            incoming: Mutex::new(server_rx),
            outgoing: parking_lot::Mutex::new(Some(server_tx)),
            closed: CancellationToken::new(),
        });
        let handle = ClientHandle {
            tx: client_tx,
            rx: Mutex::new(client_rx),
        };
        (transport, handle)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read_message(&self) -> AppResult<ClientMessage> {
        let mut rx = self.incoming.lock().await;
        tokio::select! {
            _ = self.closed.cancelled() => Err(AppError::ClientDisconnected),
            msg = rx.recv() => msg.ok_or(AppError::ClientDisconnected),
        }
    }

    async fn write_message(&self, msg: &ServerMessage) -> AppResult<()> {
        let tx = self.outgoing.lock().clone();
        match tx {
            Some(tx) => tx
                .send(msg.clone())
                .map_err(|_| AppError::ClientDisconnected),
            None => Err(AppError::ClientDisconnected),
        }
    }

    async fn close(&self) -> AppResult<()> {
        // drop the sender so the client sees end-of-stream
        self.outgoing.lock().take();
        self.closed.cancel();
        Ok(())
    }
}

impl ClientHandle {
    /// Send a message to the server side of the pair
    pub fn send(&self, msg: ClientMessage) -> AppResult<()> {
        self.tx.send(msg).map_err(|_| AppError::ClientDisconnected)
    }

    /// Next server message, `None` once the server closed the connection
    pub async fn recv(&self) -> Option<ServerMessage> {
        self.rx.lock().await.recv().await
    }

    /// `recv` bounded by a timeout; `None` on timeout or close
    pub async fn recv_timeout(&self, timeout: std::time::Duration) -> Option<ServerMessage> {
        tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_carries_messages_both_ways() {
        let (transport, client) = MemoryTransport::pair();

        client.send(ClientMessage::Ping).unwrap();
        assert!(matches!(
            transport.read_message().await.unwrap(),
            ClientMessage::Ping
        ));

        transport
            .write_message(&ServerMessage::Pong { timestamp: 7 })
            .await
            .unwrap();
        assert!(matches!(
            client.recv().await,
            Some(ServerMessage::Pong { timestamp: 7 })
        ));
    }

    #[tokio::test]
    async fn close_ends_both_directions() {
        let (transport, client) = MemoryTransport::pair();
        transport.close().await.unwrap();

        assert!(client.recv().await.is_none());
        assert!(transport
            .write_message(&ServerMessage::Pong { timestamp: 1 })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn close_unblocks_a_parked_reader() {
        let (transport, _client) = MemoryTransport::pair();

        // park a reader on the empty channel, then close from outside
        let reading = transport.clone();
        let reader = tokio::spawn(async move { reading.read_message().await });
        tokio::task::yield_now().await;

        transport.close().await.unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), reader)
            .await
            .expect("close must unblock the reader")
            .unwrap();
        assert!(result.unwrap_err().is_disconnect());
    }
}
