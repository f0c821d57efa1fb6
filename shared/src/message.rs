//! Realtime wire message contract (实时消息协议)
//!
//! JSON objects over a persistent bidirectional channel, tagged by
//! `type`. Two disjoint directions:
//!
//! - [`ClientMessage`] — everything a staff dashboard or table session
//!   may send to the server.
//! - [`ServerMessage`] — replies, fan-out events and broadcaster
//!   notifications going back to clients.
//!
//! An unauthenticated connection may only send `auth`, `table_auth`
//! and `ping`; the server enforces that, not the types here.

use serde::{Deserialize, Serialize};

use crate::order::{Order, OrderDraft, OrderStatus};

/// Messages clients send to the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Staff handshake carrying a bearer credential
    Auth { token: String },
    /// Table handshake carrying the scanned table identity
    #[serde(rename_all = "camelCase")]
    TableAuth { table_id: i64, restaurant_id: i64 },
    /// Liveness probe; valid in any state
    Ping,
    /// Place an order (table role only)
    NewOrder { order: OrderDraft },
    /// Move an order through the kitchen flow (staff role only)
    UpdateOrderStatus { order: OrderStatusUpdate },
}

/// Payload of `update_order_status`
///
/// Status arrives as a free string so the server can answer
/// "Invalid order status" instead of a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusUpdate {
    pub id: i64,
    pub status: String,
}

/// Messages the server sends to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Staff handshake reply
    #[serde(rename_all = "camelCase")]
    Auth {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        tenant_id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Table handshake reply
    #[serde(rename_all = "camelCase")]
    TableAuth {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        table_id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        restaurant_id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Liveness acknowledgement (unix millis)
    Pong { timestamp: i64 },
    /// Fan-out to staff when a table places an order
    #[serde(rename_all = "camelCase")]
    NewOrder { order: Order, table_id: i64 },
    /// Acknowledgement to the table session that placed the order
    #[serde(rename_all = "camelCase")]
    OrderReceived { order_id: i64, status: OrderStatus },
    /// Status change fan-out. Table sessions get `orderId`/`status`/
    /// `message`; other staff dashboards get the full `order`.
    #[serde(rename_all = "camelCase")]
    OrderStatusUpdated {
        #[serde(skip_serializing_if = "Option::is_none")]
        order_id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<OrderStatus>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        order: Option<Order>,
    },
    /// Broadcaster-originated: the order left the customer view
    #[serde(rename_all = "camelCase")]
    OrderHidden {
        order_id: i64,
        order_number: String,
        reason: String,
    },
    /// Broadcaster-originated: the table is ready for the next guest
    #[serde(rename_all = "camelCase")]
    TableReset { table_id: i64, message: String },
    /// Any invalid or unauthorized message
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn auth_ok(tenant_id: i64) -> Self {
        ServerMessage::Auth {
            success: true,
            tenant_id: Some(tenant_id),
            error: None,
        }
    }

    pub fn auth_rejected(error: impl Into<String>) -> Self {
        ServerMessage::Auth {
            success: false,
            tenant_id: None,
            error: Some(error.into()),
        }
    }

    pub fn table_auth_ok(table_id: i64, restaurant_id: i64) -> Self {
        ServerMessage::TableAuth {
            success: true,
            table_id: Some(table_id),
            restaurant_id: Some(restaurant_id),
            error: None,
        }
    }

    pub fn table_auth_rejected(error: impl Into<String>) -> Self {
        ServerMessage::TableAuth {
            success: false,
            table_id: None,
            restaurant_id: None,
            error: Some(error.into()),
        }
    }

    /// Table-facing shape of `order_status_updated`
    pub fn status_update_for_table(order_id: i64, status: OrderStatus, message: String) -> Self {
        ServerMessage::OrderStatusUpdated {
            order_id: Some(order_id),
            status: Some(status),
            message: Some(message),
            order: None,
        }
    }

    /// Staff-facing shape of `order_status_updated`
    pub fn status_update_for_staff(order: Order) -> Self {
        ServerMessage::OrderStatusUpdated {
            order_id: None,
            status: None,
            message: None,
            order: Some(order),
        }
    }
}
