//! In-memory store implementation
//!
//! DashMap 实现的进程内存储，供测试和演示入口使用。生产部署用
//! 平台的关系型存储实现同样的 trait。

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use shared::order::{Order, OrderDraft, OrderStatus};
use shared::table::{Table, TenantProtocolSettings};

use super::{OrderStore, StoreError, StoreResult, TableStore, TenantStore};

/// In-process store backing all three collaborator traits
#[derive(Debug, Default)]
pub struct MemoryStore {
    orders: DashMap<i64, Order>,
    tables: DashMap<i64, Table>,
    tenants: DashMap<i64, TenantProtocolSettings>,
    next_order_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            tables: DashMap::new(),
            tenants: DashMap::new(),
            next_order_id: AtomicI64::new(1),
        }
    }

    /// Seed a table (test/demo helper)
    pub fn insert_table(&self, table: Table) {
        self.tables.insert(table.id, table);
    }

    /// Seed an order verbatim, including timestamps (test helper)
    pub fn insert_order(&self, order: Order) {
        let id = order.id;
        self.orders.insert(id, order);
        // keep the sequence ahead of seeded ids
        self.next_order_id.fetch_max(id + 1, Ordering::SeqCst);
    }

    /// Seed tenant lifecycle settings (test/demo helper)
    pub fn insert_tenant_settings(&self, restaurant_id: i64, settings: TenantProtocolSettings) {
        self.tenants.insert(restaurant_id, settings);
    }

    pub fn get_order(&self, order_id: i64) -> Option<Order> {
        self.orders.get(&order_id).map(|o| o.clone())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_served_unhidden(&self) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.status == OrderStatus::Served && !o.hidden)
            .map(|o| o.clone())
            .collect();
        orders.sort_by_key(|o| o.id);
        Ok(orders)
    }

    async fn find_active_by_table(&self, table_id: i64) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.table_id == table_id && o.is_active())
            .map(|o| o.clone())
            .collect();
        orders.sort_by_key(|o| o.id);
        Ok(orders)
    }

    async fn find_by_id(&self, order_id: i64) -> StoreResult<Option<Order>> {
        Ok(self.orders.get(&order_id).map(|o| o.clone()))
    }

    async fn create(
        &self,
        table_id: i64,
        restaurant_id: i64,
        draft: OrderDraft,
    ) -> StoreResult<Order> {
        let id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let order = Order {
            id,
            order_number: draft.order_number.unwrap_or_else(|| format!("#{id}")),
            table_id,
            restaurant_id,
            status: OrderStatus::Received,
            hidden: false,
            served_at: None,
            created_at: now,
            updated_at: now,
            session_id: draft.session_id,
        };
        self.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn update_status(&self, order_id: i64, status: OrderStatus) -> StoreResult<Order> {
        let mut entry = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::NotFound(format!("Order {order_id} not found")))?;

        entry.status = status;
        if status == OrderStatus::Served && entry.served_at.is_none() {
            entry.served_at = Some(Utc::now());
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn mark_hidden(&self, order_id: i64) -> StoreResult<Order> {
        let mut entry = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::NotFound(format!("Order {order_id} not found")))?;

        if !entry.hidden {
            entry.hidden = true;
            entry.updated_at = Utc::now();
        }
        Ok(entry.clone())
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn find_by_id(&self, table_id: i64) -> StoreResult<Option<Table>> {
        Ok(self.tables.get(&table_id).map(|t| t.clone()))
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn protocol_settings(
        &self,
        restaurant_id: i64,
    ) -> StoreResult<Option<TenantProtocolSettings>> {
        Ok(self.tenants.get(&restaurant_id).map(|s| s.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn served_order(id: i64, table_id: i64, hidden: bool) -> Order {
        let now = Utc::now();
        Order {
            id,
            order_number: format!("#{id}"),
            table_id,
            restaurant_id: 1,
            status: OrderStatus::Served,
            hidden,
            served_at: Some(now),
            created_at: now,
            updated_at: now,
            session_id: None,
        }
    }

    #[tokio::test]
    async fn served_unhidden_excludes_hidden_orders() {
        let store = MemoryStore::new();
        store.insert_order(served_order(1, 10, false));
        store.insert_order(served_order(2, 10, true));

        let found = store.find_served_unhidden().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 1);
    }

    #[tokio::test]
    async fn update_status_sets_served_at_once() {
        let store = MemoryStore::new();
        let order = store
            .create(3, 1, OrderDraft {
                order_number: None,
                items: serde_json::Value::Null,
                session_id: None,
            })
            .await
            .unwrap();
        assert!(order.served_at.is_none());

        let served = store
            .update_status(order.id, OrderStatus::Served)
            .await
            .unwrap();
        let first_served_at = served.served_at.expect("served_at set on transition");

        // a second transition to Served must not move the timestamp
        let again = store
            .update_status(order.id, OrderStatus::Served)
            .await
            .unwrap();
        assert_eq!(again.served_at, Some(first_served_at));
    }

    #[tokio::test]
    async fn mark_hidden_is_idempotent() {
        let store = MemoryStore::new();
        store.insert_order(served_order(5, 2, false));

        let hidden = store.mark_hidden(5).await.unwrap();
        assert!(hidden.hidden);
        let again = store.mark_hidden(5).await.unwrap();
        assert!(again.hidden);
    }
}
