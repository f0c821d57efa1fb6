//! Table-side browsing session (桌台会话)
//!
//! A durable opaque token assigned once per browser. Not tied to
//! authentication; only used to split "my orders" from other active
//! orders at the same table when rendering the customer view.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Order;

/// Opaque session token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSession(String);

impl TableSession {
    /// Mint a fresh token for a browser seeing the table for the first time
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split a table's active orders into this session's own orders and
    /// everyone else's. Visibility only — lifecycle decisions never look
    /// at the session.
    pub fn partition_orders(&self, orders: &[Order]) -> (Vec<Order>, Vec<Order>) {
        orders
            .iter()
            .filter(|o| o.is_active())
            .cloned()
            .partition(|o| o.session_id.as_deref() == Some(self.0.as_str()))
    }
}

impl std::fmt::Display for TableSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
