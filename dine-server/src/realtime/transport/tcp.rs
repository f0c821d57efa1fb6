//! TCP 传输层实现

use std::sync::Arc;

use async_trait::async_trait;
use shared::message::{ClientMessage, ServerMessage};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

use super::{Transport, read_from_stream, write_to_stream};
use crate::utils::{AppError, AppResult};

/// 基于 TCP 的换行分隔 JSON 传输
#[derive(Debug, Clone)]
pub struct TcpTransport {
    reader: Arc<Mutex<BufReader<OwnedReadHalf>>>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    addr: Option<String>,
}

impl TcpTransport {
    /// 从已建立的 TcpStream 创建
    pub fn from_stream(stream: TcpStream) -> Self {
        let peer_addr = stream.peer_addr().ok().map(|a| a.to_string());
        let (reader, writer) = stream.into_split();
        Self {
            reader: Arc::new(Mutex::new(BufReader::new(reader))),
            writer: Arc::new(Mutex::new(writer)),
            addr: peer_addr,
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn read_message(&self) -> AppResult<ClientMessage> {
        let mut reader = self.reader.lock().await;
        read_from_stream(&mut *reader).await
    }

    async fn write_message(&self, msg: &ServerMessage) -> AppResult<()> {
        let mut writer = self.writer.lock().await;
        write_to_stream(&mut *writer, msg).await
    }

    async fn close(&self) -> AppResult<()> {
        use tokio::io::AsyncWriteExt;
        let mut writer = self.writer.lock().await;
        writer
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("TCP close failed: {}", e)))?;
        Ok(())
    }

    fn peer_addr(&self) -> Option<String> {
        self.addr.clone()
    }
}
