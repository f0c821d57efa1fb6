//! Authentication provider collaborator (认证服务接口)
//!
//! Credential verification lives in the platform's auth service; the
//! connection manager only needs this trait. The two failure modes stay
//! distinct so the staff handshake can phrase its rejection differently
//! for an invalid token versus an unreachable provider.

use async_trait::async_trait;
use dashmap::DashMap;

/// Verified staff identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffIdentity {
    pub restaurant_id: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Authentication service unavailable: {0}")]
    Unreachable(String),
}

/// Bearer-credential verification
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<StaffIdentity, AuthError>;
}

/// Fixed token → tenant mapping for tests and the demo entrypoint
#[derive(Debug, Default)]
pub struct MockAuthProvider {
    tokens: DashMap<String, i64>,
    unreachable: std::sync::atomic::AtomicBool,
}

impl MockAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_token(&self, token: impl Into<String>, restaurant_id: i64) {
        self.tokens.insert(token.into(), restaurant_id);
    }

    /// Simulate a provider outage
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable
            .store(unreachable, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn verify_token(&self, token: &str) -> Result<StaffIdentity, AuthError> {
        if self.unreachable.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AuthError::Unreachable("connection refused".into()));
        }
        self.tokens
            .get(token)
            .map(|restaurant_id| StaffIdentity {
                restaurant_id: *restaurant_id,
            })
            .ok_or(AuthError::InvalidToken)
    }
}
