//! Order & Table Store collaborator interfaces
//!
//! The relational store is owned by another part of the platform; the
//! lifecycle engine only sees these traits. [`MemoryStore`] backs tests
//! and the demo entrypoint.
//!
//! 写入约束：`mark_hidden` 是单行单语句更新，`hidden` 只能 false→true。

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use shared::order::{Order, OrderDraft, OrderStatus};
use shared::table::{Table, TenantProtocolSettings};

/// Store-level errors, converted to `AppError` at the engine boundary
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Order persistence as the lifecycle engine needs it
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// All orders with status=Served and hidden=false, across every tenant.
    /// This is the cleanup cycle's working set.
    async fn find_served_unhidden(&self) -> StoreResult<Vec<Order>>;

    /// A table's orders with hidden=false and status != Cancelled
    async fn find_active_by_table(&self, table_id: i64) -> StoreResult<Vec<Order>>;

    async fn find_by_id(&self, order_id: i64) -> StoreResult<Option<Order>>;

    /// Create an order with status=Received, hidden=false
    async fn create(
        &self,
        table_id: i64,
        restaurant_id: i64,
        draft: OrderDraft,
    ) -> StoreResult<Order>;

    /// Move an order to a new status. Sets `served_at` exactly when the
    /// target is Served and the field is still null.
    async fn update_status(&self, order_id: i64, status: OrderStatus) -> StoreResult<Order>;

    /// Flip `hidden` to true and refresh `updated_at`. Idempotent; a
    /// hidden order stays hidden.
    async fn mark_hidden(&self, order_id: i64) -> StoreResult<Order>;
}

/// Table lookups used by the table-side handshake
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn find_by_id(&self, table_id: i64) -> StoreResult<Option<Table>>;
}

/// Tenant settings read by the protocol configuration cache
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn protocol_settings(
        &self,
        restaurant_id: i64,
    ) -> StoreResult<Option<TenantProtocolSettings>>;
}
