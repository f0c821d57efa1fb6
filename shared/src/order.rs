//! Order model (订单)
//!
//! The order as this subsystem sees it: status, the one-way `hidden`
//! flag and the timestamps the lifecycle engine decides from. Creation
//! and payment details are owned by other parts of the platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order status 状态机
///
/// Received → Preparing → Ready → Served, with Cancelled reachable
/// from any non-terminal state. Wire form is the exact variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Received,
    Preparing,
    Ready,
    Served,
    Cancelled,
}

impl OrderStatus {
    /// All statuses accepted from staff clients
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Received,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Served,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "Received",
            OrderStatus::Preparing => "Preparing",
            OrderStatus::Ready => "Ready",
            OrderStatus::Served => "Served",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status string did not match any variant name exactly
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status")]
pub struct ParseStatusError;

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Received" => Ok(OrderStatus::Received),
            "Preparing" => Ok(OrderStatus::Preparing),
            "Ready" => Ok(OrderStatus::Ready),
            "Served" => Ok(OrderStatus::Served),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(ParseStatusError),
        }
    }
}

/// Order entity (订单)
///
/// `hidden` is monotonic: the lifecycle engine may flip it false→true
/// but nothing ever sets it back. `served_at` is written exactly once,
/// when the status transitions to [`OrderStatus::Served`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    /// Display number shown to staff and customers
    pub order_number: String,
    pub table_id: i64,
    /// Owning tenant (restaurant)
    pub restaurant_id: i64,
    pub status: OrderStatus,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub served_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Table-side session that placed the order; set once, immutable
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Order {
    /// Still visible and not cancelled — counts against a table reset
    pub fn is_active(&self) -> bool {
        !self.hidden && self.status != OrderStatus::Cancelled
    }
}

/// Payload a table client sends when placing an order
///
/// Table and tenant are taken from the authenticated connection, never
/// from the payload. Item lines are opaque to the lifecycle engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub items: serde_json::Value,
    #[serde(default)]
    pub session_id: Option<String>,
}
