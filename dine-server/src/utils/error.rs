//! 统一错误处理
//!
//! 提供应用级错误类型 [`AppError`] 和结果别名 [`AppResult`]。
//!
//! # 错误分类
//!
//! | 分类 | 说明 |
//! |------|------|
//! | 认证错误 | 凭证无效、认证服务不可达 |
//! | 业务逻辑错误 | 资源不存在、验证失败 |
//! | 系统错误 | 存储错误、内部错误、无效请求 |
//!
//! 面向客户端的失败永远以 `{"type":"error","message":...}` 消息呈现，
//! 这里的枚举只在进程内部流转。

use crate::store::StoreError;

/// 应用错误枚举
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    /// 未认证连接发送了业务消息
    Unauthorized,

    #[error("Resource not found: {0}")]
    /// 资源不存在
    NotFound(String),

    #[error("Validation failed: {0}")]
    /// 验证失败
    Validation(String),

    #[error("Store error: {0}")]
    /// 存储错误
    Database(String),

    #[error("Internal server error: {0}")]
    /// 内部错误
    Internal(String),

    #[error("Invalid request: {0}")]
    /// 无效请求（含无法解析的消息帧）
    Invalid(String),

    #[error("Client disconnected")]
    /// 对端关闭连接
    ClientDisconnected,
}

pub type AppResult<T> = Result<T, AppError>;

// ========== Helper Constructors ==========

impl AppError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// 是否对端断开（读循环用来区分正常下线和协议错误）
    pub fn is_disconnect(&self) -> bool {
        matches!(self, AppError::ClientDisconnected)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => AppError::NotFound(msg),
            StoreError::Validation(msg) => AppError::Validation(msg),
            StoreError::Backend(msg) => AppError::Database(msg),
        }
    }
}
