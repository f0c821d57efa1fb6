//! Protocol Manager - 清理周期
//!
//! 每个 tick 扫一次全局可清理订单，按租户分组解析协议，把到期的
//! 订单隐藏掉，再对受影响的桌台做重置判定。顺序保证：同一周期内，
//! 一张桌台的所有隐藏先于它的重置判定提交。
//!
//! # 周期步骤
//!
//! 1. 查询所有 status=Served 且 hidden=false 的订单（跨租户一次查询）
//! 2. 按租户分组，每租户每周期只解析一次配置
//! 3. manual 协议的租户整体跳过
//! 4. 逐单判定并提交隐藏，触发钩子和 `order_hidden` 广播
//! 5. 对受影响桌台判定重置，触发钩子和 `table_reset` 广播
//! 6. 返回计数，仅在非零时记日志

use std::collections::BTreeMap;
use std::sync::Arc;

use shared::message::ServerMessage;
use shared::order::Order;

use crate::broadcast::{EventBroadcaster, Topic};
use crate::store::OrderStore;

use super::{ProtocolConfigCache, ProtocolKind, ProtocolRegistry};

/// Per-cycle observability counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub orders_hidden: usize,
    pub tables_reset: usize,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.orders_hidden == 0 && self.tables_reset == 0
    }
}

/// Registers protocols, resolves tenant configuration and runs the
/// cleanup cycle
pub struct ProtocolManager {
    registry: Arc<ProtocolRegistry>,
    config_cache: ProtocolConfigCache,
    orders: Arc<dyn OrderStore>,
    broadcaster: Arc<dyn EventBroadcaster>,
    /// 防止周期重叠：一个 tick 还没跑完时，下一个 tick 直接跳过
    cycle_guard: tokio::sync::Mutex<()>,
}

impl ProtocolManager {
    pub fn new(
        registry: Arc<ProtocolRegistry>,
        config_cache: ProtocolConfigCache,
        orders: Arc<dyn OrderStore>,
        broadcaster: Arc<dyn EventBroadcaster>,
    ) -> Self {
        Self {
            registry,
            config_cache,
            orders,
            broadcaster,
            cycle_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Drop cached configuration after tenant settings change
    pub fn invalidate_tenant_config(&self, restaurant_id: Option<i64>) {
        self.config_cache.invalidate(restaurant_id);
    }

    /// Run one cleanup cycle. A store-mutation failure aborts the cycle
    /// with zero counts; hidden stays monotonic so the next tick simply
    /// retries whatever is left.
    pub async fn run_cleanup_cycle(&self) -> CleanupReport {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            tracing::warn!("Previous cleanup cycle still running, skipping this tick");
            return CleanupReport::default();
        };

        let candidates = match self.orders.find_served_unhidden().await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::error!(error = %e, "Cleanup cycle failed to query served orders");
                return CleanupReport::default();
            }
        };

        // Step 2: group by tenant so configuration resolves once per
        // tenant per cycle, not per order
        let mut by_tenant: BTreeMap<i64, Vec<Order>> = BTreeMap::new();
        for order in candidates {
            by_tenant.entry(order.restaurant_id).or_default().push(order);
        }

        let mut report = CleanupReport::default();
        // table_id → (protocol, restaurant_id); reset checks run only
        // after every hide in the cycle has committed
        let mut affected_tables: BTreeMap<i64, (Arc<dyn super::LifecycleProtocol>, i64)> =
            BTreeMap::new();

        for (restaurant_id, orders) in by_tenant {
            let config = self.config_cache.get(restaurant_id).await;

            if ProtocolKind::from_name(&config.protocol_name) == Some(ProtocolKind::Manual) {
                tracing::debug!(restaurant_id, "Manual protocol tenant, skipping cleanup");
                continue;
            }

            let protocol = self.registry.resolve(&config.protocol_name);

            for order in orders {
                let decision = protocol.should_hide(&order, &config);
                if !decision.hide {
                    continue;
                }

                // 提交隐藏必须先于通知，保证 hidden 与 notified 一致
                let hidden = match self.orders.mark_hidden(order.id).await {
                    Ok(order) => order,
                    Err(e) => {
                        tracing::error!(
                            order_id = order.id,
                            error = %e,
                            "Failed to hide order, aborting cleanup cycle"
                        );
                        return CleanupReport::default();
                    }
                };

                if let Err(e) = protocol.on_order_hidden(&hidden) {
                    tracing::warn!(order_id = hidden.id, error = %e, "on_order_hidden hook failed");
                }

                let event = ServerMessage::OrderHidden {
                    order_id: hidden.id,
                    order_number: hidden.order_number.clone(),
                    reason: decision.reason.unwrap_or("expired").to_string(),
                };
                let _ = self
                    .broadcaster
                    .publish(&Topic::table(hidden.table_id), event)
                    .await;

                report.orders_hidden += 1;
                affected_tables.insert(hidden.table_id, (protocol.clone(), restaurant_id));
            }
        }

        // Step 5: reset checks, causally after the hides
        for (table_id, (protocol, restaurant_id)) in affected_tables {
            let remaining = match self.orders.find_active_by_table(table_id).await {
                Ok(orders) => orders,
                Err(e) => {
                    tracing::warn!(table_id, error = %e, "Failed to read table orders, skipping reset check");
                    continue;
                }
            };

            let decision = protocol.should_reset(table_id, &remaining);
            if !decision.reset {
                continue;
            }

            if let Err(e) = protocol.on_table_reset(table_id) {
                tracing::warn!(table_id, error = %e, "on_table_reset hook failed");
            }

            let message = decision
                .message
                .unwrap_or_else(|| "Table is ready for the next guest".to_string());
            let event = ServerMessage::TableReset { table_id, message };

            // 桌台侧和员工侧都要知道桌台空了
            let _ = self
                .broadcaster
                .publish(&Topic::table(table_id), event.clone())
                .await;
            let _ = self
                .broadcaster
                .publish(&Topic::tenant(restaurant_id), event)
                .await;

            report.tables_reset += 1;
        }

        if !report.is_empty() {
            tracing::info!(
                orders_hidden = report.orders_hidden,
                tables_reset = report.tables_reset,
                "Cleanup cycle finished"
            );
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use shared::order::{OrderDraft, OrderStatus};
    use shared::table::TenantProtocolSettings;
    use std::time::Duration;

    use crate::broadcast::ChannelBroadcaster;
    use crate::store::{MemoryStore, StoreError, StoreResult};

    fn manager_over(
        store: Arc<MemoryStore>,
        broadcaster: Arc<ChannelBroadcaster>,
    ) -> ProtocolManager {
        let registry = Arc::new(ProtocolRegistry::new());
        let cache = ProtocolConfigCache::new(
            store.clone(),
            registry.clone(),
            Duration::from_secs(60),
        );
        ProtocolManager::new(registry, cache, store, broadcaster)
    }

    fn served_order(id: i64, table_id: i64, restaurant_id: i64, minutes_ago: i64) -> shared::Order {
        let now = Utc::now();
        shared::Order {
            id,
            order_number: format!("#{id}"),
            table_id,
            restaurant_id,
            status: OrderStatus::Served,
            hidden: false,
            served_at: Some(now - ChronoDuration::minutes(minutes_ago)),
            created_at: now - ChronoDuration::minutes(minutes_ago + 30),
            updated_at: now,
            session_id: None,
        }
    }

    #[tokio::test]
    async fn hides_expired_orders_and_resets_emptied_tables() {
        let store = Arc::new(MemoryStore::new());
        let broadcaster = Arc::new(ChannelBroadcaster::new(16));
        let mut events = broadcaster.subscribe();

        store.insert_order(served_order(1, 4, 7, 11));

        let manager = manager_over(store.clone(), broadcaster);
        let report = manager.run_cleanup_cycle().await;

        assert_eq!(report, CleanupReport {
            orders_hidden: 1,
            tables_reset: 1,
        });
        assert!(store.get_order(1).unwrap().hidden);

        let (topic, event) = events.recv().await.unwrap();
        assert_eq!(topic, Topic::table(4));
        assert!(matches!(event, ServerMessage::OrderHidden { order_id: 1, .. }));

        let (topic, event) = events.recv().await.unwrap();
        assert_eq!(topic, Topic::table(4));
        assert!(matches!(event, ServerMessage::TableReset { table_id: 4, .. }));

        let (topic, _) = events.recv().await.unwrap();
        assert_eq!(topic, Topic::tenant(7));
    }

    #[tokio::test]
    async fn fresh_orders_block_both_hide_and_reset() {
        let store = Arc::new(MemoryStore::new());
        store.insert_order(served_order(1, 4, 7, 11));
        // second order on the same table, still inside the delay
        store.insert_order(served_order(2, 4, 7, 3));

        let manager = manager_over(store.clone(), Arc::new(ChannelBroadcaster::new(16)));
        let report = manager.run_cleanup_cycle().await;

        assert_eq!(report.orders_hidden, 1);
        assert_eq!(report.tables_reset, 0);
        assert!(store.get_order(1).unwrap().hidden);
        assert!(!store.get_order(2).unwrap().hidden);
    }

    #[tokio::test]
    async fn manual_tenants_are_skipped_wholesale() {
        let store = Arc::new(MemoryStore::new());
        store.insert_tenant_settings(7, TenantProtocolSettings {
            protocol: Some("manual".into()),
            hide_delay_minutes: None,
        });
        store.insert_order(served_order(1, 4, 7, 600));

        let manager = manager_over(store.clone(), Arc::new(ChannelBroadcaster::new(16)));
        let report = manager.run_cleanup_cycle().await;

        assert!(report.is_empty());
        assert!(!store.get_order(1).unwrap().hidden);
    }

    #[tokio::test]
    async fn second_immediate_run_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        store.insert_order(served_order(1, 4, 7, 11));
        store.insert_order(served_order(2, 5, 7, 12));

        let manager = manager_over(store.clone(), Arc::new(ChannelBroadcaster::new(32)));

        let first = manager.run_cleanup_cycle().await;
        assert_eq!(first.orders_hidden, 2);
        assert_eq!(first.tables_reset, 2);

        // no time has passed: nothing new to hide, hidden never reverts
        let second = manager.run_cleanup_cycle().await;
        assert!(second.is_empty());
        assert!(store.get_order(1).unwrap().hidden);
        assert!(store.get_order(2).unwrap().hidden);
    }

    #[tokio::test]
    async fn tenant_override_shortens_the_delay() {
        let store = Arc::new(MemoryStore::new());
        store.insert_tenant_settings(7, TenantProtocolSettings {
            protocol: Some("default".into()),
            hide_delay_minutes: Some(2),
        });
        store.insert_order(served_order(1, 4, 7, 3));

        let manager = manager_over(store.clone(), Arc::new(ChannelBroadcaster::new(16)));
        let report = manager.run_cleanup_cycle().await;
        assert_eq!(report.orders_hidden, 1);
    }

    /// OrderStore that fails every mutation
    struct ReadOnlyStore {
        inner: Arc<MemoryStore>,
    }

    #[async_trait]
    impl crate::store::OrderStore for ReadOnlyStore {
        async fn find_served_unhidden(&self) -> StoreResult<Vec<shared::Order>> {
            self.inner.find_served_unhidden().await
        }
        async fn find_active_by_table(&self, table_id: i64) -> StoreResult<Vec<shared::Order>> {
            self.inner.find_active_by_table(table_id).await
        }
        async fn find_by_id(&self, order_id: i64) -> StoreResult<Option<shared::Order>> {
            self.inner.find_by_id(order_id).await
        }
        async fn create(
            &self,
            _table_id: i64,
            _restaurant_id: i64,
            _draft: OrderDraft,
        ) -> StoreResult<shared::Order> {
            Err(StoreError::Backend("read-only".into()))
        }
        async fn update_status(
            &self,
            _order_id: i64,
            _status: OrderStatus,
        ) -> StoreResult<shared::Order> {
            Err(StoreError::Backend("read-only".into()))
        }
        async fn mark_hidden(&self, _order_id: i64) -> StoreResult<shared::Order> {
            Err(StoreError::Backend("disk full".into()))
        }
    }

    #[tokio::test]
    async fn mutation_failure_aborts_cycle_with_zero_counts() {
        let inner = Arc::new(MemoryStore::new());
        inner.insert_order(served_order(1, 4, 7, 11));
        let store = Arc::new(ReadOnlyStore {
            inner: inner.clone(),
        });

        let registry = Arc::new(ProtocolRegistry::new());
        let cache = ProtocolConfigCache::new(
            inner.clone(),
            registry.clone(),
            Duration::from_secs(60),
        );
        let manager = ProtocolManager::new(
            registry,
            cache,
            store,
            Arc::new(ChannelBroadcaster::new(16)),
        );

        let report = manager.run_cleanup_cycle().await;
        assert!(report.is_empty());
        // the order survives for the next tick to retry
        assert!(!inner.get_order(1).unwrap().hidden);
    }
}
