//! 连接消息处理
//!
//! 按连接状态和角色分发客户端消息：
//!
//! - 心跳在任何状态下都被处理并立刻应答
//! - 未认证连接只允许握手和心跳，其他消息回错误并强制断开
//! - 角色不匹配的业务消息回错误但保持连接
//!
//! 所有失败都以 `{"type":"error","message":...}` 呈现，从不把内部
//! 异常裸露给客户端。

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use shared::message::{ClientMessage, OrderStatusUpdate, ServerMessage};
use shared::order::{OrderDraft, OrderStatus};

use crate::auth::{AuthError, AuthProvider};
use crate::store::{OrderStore, TableStore};

use super::connection::{Connection, ConnectionState};
use super::registry::ConnectionRegistry;

/// Collaborators the dispatch needs, independent of the accept loop
pub struct HandlerContext {
    pub registry: Arc<ConnectionRegistry>,
    pub orders: Arc<dyn OrderStore>,
    pub tables: Arc<dyn TableStore>,
    pub auth: Arc<dyn AuthProvider>,
}

/// What the read loop should do after one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    Continue,
    /// Protocol violation: error already sent, connection must close
    Close,
}

/// Customer-facing text for a status change
pub fn customer_status_message(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Received => "Your order has been received",
        OrderStatus::Preparing => "Your order is being prepared",
        OrderStatus::Ready => "Your order is ready",
        OrderStatus::Served => "Your order has been served",
        OrderStatus::Cancelled => "Your order has been cancelled",
    }
}

/// Dispatch a single client message
pub async fn handle_message(
    ctx: &HandlerContext,
    conn: &Arc<Connection>,
    msg: ClientMessage,
) -> HandleOutcome {
    // Closed 是终态；已关闭连接上迟到的消息直接终止循环
    if conn.state() == ConnectionState::Closed {
        return HandleOutcome::Close;
    }

    match msg {
        // 心跳：任何状态都处理
        ClientMessage::Ping => {
            conn.touch_heartbeat();
            let _ = conn
                .send(&ServerMessage::Pong {
                    timestamp: Utc::now().timestamp_millis(),
                })
                .await;
            HandleOutcome::Continue
        }

        ClientMessage::Auth { token } => handle_staff_auth(ctx, conn, token).await,

        ClientMessage::TableAuth {
            table_id,
            restaurant_id,
        } => handle_table_auth(ctx, conn, table_id, restaurant_id).await,

        ClientMessage::NewOrder { order } => match conn.state() {
            ConnectionState::Table {
                table_id,
                restaurant_id,
            } => handle_new_order(ctx, conn, table_id, restaurant_id, order).await,
            ConnectionState::Connected => reject_unauthenticated(conn).await,
            _ => {
                let _ = conn
                    .send(&ServerMessage::error("Only table sessions may place orders"))
                    .await;
                HandleOutcome::Continue
            }
        },

        ClientMessage::UpdateOrderStatus { order } => match conn.state() {
            ConnectionState::Staff { restaurant_id } => {
                handle_status_update(ctx, conn, restaurant_id, order).await
            }
            ConnectionState::Connected => reject_unauthenticated(conn).await,
            _ => {
                let _ = conn
                    .send(&ServerMessage::error("Only staff may update order status"))
                    .await;
                HandleOutcome::Continue
            }
        },
    }
}

/// 未认证连接发业务消息：回错误并强制断开
async fn reject_unauthenticated(conn: &Connection) -> HandleOutcome {
    let _ = conn
        .send(&ServerMessage::error("Authentication required"))
        .await;
    HandleOutcome::Close
}

async fn handle_staff_auth(
    ctx: &HandlerContext,
    conn: &Arc<Connection>,
    token: String,
) -> HandleOutcome {
    if conn.is_authenticated() {
        let _ = conn
            .send(&ServerMessage::error("Connection already authenticated"))
            .await;
        return HandleOutcome::Continue;
    }

    match ctx.auth.verify_token(&token).await {
        Ok(identity) => {
            ctx.registry
                .register_staff(conn.clone(), identity.restaurant_id);
            tracing::debug!(
                conn_id = %conn.id,
                restaurant_id = identity.restaurant_id,
                "Staff connection authenticated"
            );
            let _ = conn
                .send(&ServerMessage::auth_ok(identity.restaurant_id))
                .await;
            HandleOutcome::Continue
        }
        // 两种失败只靠文案区分；连接保持打开允许重试
        Err(AuthError::InvalidToken) => {
            let _ = conn
                .send(&ServerMessage::auth_rejected("Invalid authentication token"))
                .await;
            HandleOutcome::Continue
        }
        Err(AuthError::Unreachable(e)) => {
            tracing::warn!(error = %e, "Auth provider unreachable");
            let _ = conn
                .send(&ServerMessage::auth_rejected(
                    "Authentication service unavailable",
                ))
                .await;
            HandleOutcome::Continue
        }
    }
}

async fn handle_table_auth(
    ctx: &HandlerContext,
    conn: &Arc<Connection>,
    table_id: i64,
    restaurant_id: i64,
) -> HandleOutcome {
    if conn.is_authenticated() {
        let _ = conn
            .send(&ServerMessage::error("Connection already authenticated"))
            .await;
        return HandleOutcome::Continue;
    }

    let valid = match ctx.tables.find_by_id(table_id).await {
        Ok(Some(table)) => table.restaurant_id == restaurant_id && table.is_active,
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(table_id, error = %e, "Table lookup failed during handshake");
            false
        }
    };

    if valid {
        ctx.registry
            .register_table(conn.clone(), table_id, restaurant_id);
        tracing::debug!(conn_id = %conn.id, table_id, "Table connection authenticated");
        let _ = conn
            .send(&ServerMessage::table_auth_ok(table_id, restaurant_id))
            .await;
    } else {
        let _ = conn
            .send(&ServerMessage::table_auth_rejected("Invalid table"))
            .await;
    }
    HandleOutcome::Continue
}

async fn handle_new_order(
    ctx: &HandlerContext,
    conn: &Arc<Connection>,
    table_id: i64,
    restaurant_id: i64,
    draft: OrderDraft,
) -> HandleOutcome {
    // 桌台和租户取自已认证的连接，不信任载荷
    let order = match ctx.orders.create(table_id, restaurant_id, draft).await {
        Ok(order) => order,
        Err(e) => {
            tracing::error!(table_id, error = %e, "Failed to create order");
            let _ = conn
                .send(&ServerMessage::error("Failed to place order"))
                .await;
            return HandleOutcome::Continue;
        }
    };

    let _ = conn
        .send(&ServerMessage::OrderReceived {
            order_id: order.id,
            status: order.status,
        })
        .await;

    let delivered = ctx
        .registry
        .publish_to_tenant(
            restaurant_id,
            &ServerMessage::NewOrder {
                order: order.clone(),
                table_id,
            },
            None,
        )
        .await;
    tracing::info!(
        order_id = order.id,
        table_id,
        staff_notified = delivered,
        "Order placed"
    );
    HandleOutcome::Continue
}

async fn handle_status_update(
    ctx: &HandlerContext,
    conn: &Arc<Connection>,
    restaurant_id: i64,
    update: OrderStatusUpdate,
) -> HandleOutcome {
    let Ok(status) = OrderStatus::from_str(&update.status) else {
        let _ = conn.send(&ServerMessage::error("Invalid order status")).await;
        return HandleOutcome::Continue;
    };

    // 订单必须属于该员工的租户
    let existing = match ctx.orders.find_by_id(update.id).await {
        Ok(Some(order)) if order.restaurant_id == restaurant_id => order,
        Ok(_) => {
            let _ = conn.send(&ServerMessage::error("Order not found")).await;
            return HandleOutcome::Continue;
        }
        Err(e) => {
            tracing::error!(order_id = update.id, error = %e, "Order lookup failed");
            let _ = conn.send(&ServerMessage::error("Failed to update order")).await;
            return HandleOutcome::Continue;
        }
    };

    let updated = match ctx.orders.update_status(existing.id, status).await {
        Ok(order) => order,
        Err(e) => {
            tracing::error!(order_id = existing.id, error = %e, "Status update failed");
            let _ = conn.send(&ServerMessage::error("Failed to update order")).await;
            return HandleOutcome::Continue;
        }
    };

    // 桌台侧：精简形态；员工侧：完整订单，不回显给发送者
    ctx.registry
        .publish_to_table(
            updated.table_id,
            &ServerMessage::status_update_for_table(
                updated.id,
                status,
                customer_status_message(status).to_string(),
            ),
        )
        .await;
    ctx.registry
        .publish_to_tenant(
            restaurant_id,
            &ServerMessage::status_update_for_staff(updated.clone()),
            Some(conn.id),
        )
        .await;

    tracing::info!(order_id = updated.id, status = %status, "Order status updated");
    HandleOutcome::Continue
}
