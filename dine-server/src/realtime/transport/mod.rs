//! Transport 传输层抽象
//!
//! 实时通道的可插拔传输层。协议只规定消息契约（带 `type` 标签的
//! JSON 对象），不规定线上承载方式：
//!
//! ```text
//!         ┌────────────────────┐
//!         │   Transport Trait  │  ◄── 可插拔接口
//!         └────────┬───────────┘
//!                  │
//!         ┌────────┴────────┐
//!         ▼                 ▼
//!   TcpTransport      MemoryTransport
//!   (换行分隔 JSON)   (同进程通信/测试)
//! ```

mod memory;
mod tcp;

pub use memory::{ClientHandle, MemoryTransport};
pub use tcp::TcpTransport;

use async_trait::async_trait;
use shared::message::{ClientMessage, ServerMessage};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

use crate::utils::{AppError, AppResult};

/// 服务端视角的连接传输：读客户端消息，写服务端消息
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// 读取下一条客户端消息
    async fn read_message(&self) -> AppResult<ClientMessage>;

    /// 写出一条服务端消息
    async fn write_message(&self, msg: &ServerMessage) -> AppResult<()>;

    /// 关闭连接
    async fn close(&self) -> AppResult<()>;

    /// 对端地址（日志用）
    fn peer_addr(&self) -> Option<String> {
        None
    }
}

// ========== 辅助函数 ==========

/// 从异步流读取一条换行分隔的 JSON 消息
///
/// 空行跳过；EOF 映射为 [`AppError::ClientDisconnected`]；解析失败
/// 映射为 Invalid，调用方回一条 error 消息但不断开（换行分隔保证
/// 坏帧不会破坏后续帧同步）。
pub(crate) async fn read_from_stream<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
) -> AppResult<ClientMessage> {
    loop {
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(|e| AppError::internal(format!("Read failed: {}", e)))?;

        if n == 0 {
            return Err(AppError::ClientDisconnected);
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        return serde_json::from_str(trimmed)
            .map_err(|e| AppError::invalid(format!("Malformed message: {}", e)));
    }
}

/// 向异步流写入一条消息（JSON + 换行）
pub(crate) async fn write_to_stream<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    msg: &ServerMessage,
) -> AppResult<()> {
    let mut data = serde_json::to_vec(msg)
        .map_err(|e| AppError::internal(format!("Serialize failed: {}", e)))?;
    data.push(b'\n');

    writer
        .write_all(&data)
        .await
        .map_err(|e| AppError::internal(format!("Write failed: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| AppError::internal(format!("Flush failed: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn framing_round_trip_and_eof() {
        let mut buf = Vec::new();
        write_to_stream(&mut buf, &ServerMessage::Pong { timestamp: 42 })
            .await
            .unwrap();
        assert!(buf.ends_with(b"\n"));

        let mut input: &[u8] = b"\n{\"type\":\"ping\"}\n";
        let msg = read_from_stream(&mut input).await.unwrap();
        assert!(matches!(msg, ClientMessage::Ping));

        let err = read_from_stream(&mut input).await.unwrap_err();
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn malformed_frame_is_invalid_not_disconnect() {
        let mut input: &[u8] = b"not json at all\n";
        let err = read_from_stream(&mut input).await.unwrap_err();
        assert!(matches!(err, AppError::Invalid(_)));
    }
}
