//! Per-tenant protocol configuration cache (租户配置缓存)
//!
//! 清理周期每分钟都要知道每个租户选了哪个协议；这里加一层短 TTL
//! 缓存，避免每个 tick 都打一次存储。Store 读失败时降级为安全默认
//! 配置，清理流程只会变保守，不会中断。

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::store::TenantStore;

use super::{ProtocolKind, ProtocolRegistry};

/// Resolved lifecycle configuration for one tenant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub restaurant_id: i64,
    /// Wire name of the selected protocol
    pub protocol_name: String,
    pub hide_delay_minutes: i64,
}

impl ProtocolConfig {
    /// Safe fallback: default protocol with its own delay
    pub fn safe_default(restaurant_id: i64) -> Self {
        Self {
            restaurant_id,
            protocol_name: ProtocolKind::Default.to_string(),
            hide_delay_minutes: ProtocolKind::Default.protocol().default_hide_delay_minutes(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedEntry {
    config: ProtocolConfig,
    fetched_at: Instant,
}

/// TTL cache in front of the tenant settings store
pub struct ProtocolConfigCache {
    store: Arc<dyn TenantStore>,
    registry: Arc<ProtocolRegistry>,
    ttl: Duration,
    entries: DashMap<i64, CachedEntry>,
}

impl ProtocolConfigCache {
    pub fn new(store: Arc<dyn TenantStore>, registry: Arc<ProtocolRegistry>, ttl: Duration) -> Self {
        Self {
            store,
            registry,
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Resolve a tenant's configuration, hitting the store only on a
    /// cache miss or after TTL expiry
    pub async fn get(&self, restaurant_id: i64) -> ProtocolConfig {
        if let Some(entry) = self.entries.get(&restaurant_id)
            && entry.fetched_at.elapsed() < self.ttl
        {
            return entry.config.clone();
        }

        let config = match self.store.protocol_settings(restaurant_id).await {
            Ok(settings) => {
                let settings = settings.unwrap_or_default();
                let protocol_name = settings
                    .protocol
                    .unwrap_or_else(|| ProtocolKind::Default.to_string());
                let hide_delay_minutes = settings
                    .hide_delay_minutes
                    .filter(|d| *d > 0)
                    .unwrap_or_else(|| self.registry.default_delay_for(&protocol_name));
                ProtocolConfig {
                    restaurant_id,
                    protocol_name,
                    hide_delay_minutes,
                }
            }
            Err(e) => {
                // 不缓存失败结果，下个周期自然重试
                tracing::warn!(
                    restaurant_id,
                    error = %e,
                    "Failed to read tenant protocol settings, using safe defaults"
                );
                return ProtocolConfig::safe_default(restaurant_id);
            }
        };

        self.entries.insert(
            restaurant_id,
            CachedEntry {
                config: config.clone(),
                fetched_at: Instant::now(),
            },
        );
        config
    }

    /// Drop one tenant's entry, or every entry when `restaurant_id` is
    /// `None` (tenant settings changed)
    pub fn invalidate(&self, restaurant_id: Option<i64>) {
        match restaurant_id {
            Some(id) => {
                self.entries.remove(&id);
            }
            None => self.entries.clear(),
        }
    }

    #[cfg(test)]
    fn cached_len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shared::table::TenantProtocolSettings;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::store::{MemoryStore, StoreError, StoreResult};

    fn registry() -> Arc<ProtocolRegistry> {
        Arc::new(ProtocolRegistry::new())
    }

    /// Counts store reads to prove cache hits skip the round trip
    struct CountingStore {
        inner: MemoryStore,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl TenantStore for CountingStore {
        async fn protocol_settings(
            &self,
            restaurant_id: i64,
        ) -> StoreResult<Option<TenantProtocolSettings>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.protocol_settings(restaurant_id).await
        }
    }

    struct FailingStore;

    #[async_trait]
    impl TenantStore for FailingStore {
        async fn protocol_settings(
            &self,
            _restaurant_id: i64,
        ) -> StoreResult<Option<TenantProtocolSettings>> {
            Err(StoreError::Backend("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn hit_within_ttl_skips_the_store() {
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(),
            reads: AtomicUsize::new(0),
        });
        store.inner.insert_tenant_settings(1, TenantProtocolSettings {
            protocol: Some("quick_turn".into()),
            hide_delay_minutes: None,
        });

        let cache =
            ProtocolConfigCache::new(store.clone(), registry(), Duration::from_secs(60));

        let first = cache.get(1).await;
        assert_eq!(first.protocol_name, "quick_turn");
        assert_eq!(first.hide_delay_minutes, 5);

        let second = cache.get(1).await;
        assert_eq!(second, first);
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ttl_expiry_and_invalidate_refetch() {
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(),
            reads: AtomicUsize::new(0),
        });
        let cache = ProtocolConfigCache::new(store.clone(), registry(), Duration::ZERO);

        cache.get(1).await;
        cache.get(1).await;
        // zero TTL: every lookup goes to the store
        assert_eq!(store.reads.load(Ordering::SeqCst), 2);

        let cache =
            ProtocolConfigCache::new(store.clone(), registry(), Duration::from_secs(60));
        cache.get(1).await;
        cache.invalidate(Some(1));
        cache.get(1).await;
        assert_eq!(store.reads.load(Ordering::SeqCst), 4);

        cache.get(2).await;
        cache.invalidate(None);
        assert_eq!(cache.cached_len(), 0);
    }

    #[tokio::test]
    async fn missing_settings_default_and_non_positive_override_ignored() {
        let store = Arc::new(MemoryStore::new());
        store.insert_tenant_settings(2, TenantProtocolSettings {
            protocol: Some("default".into()),
            hide_delay_minutes: Some(-3),
        });

        let cache = ProtocolConfigCache::new(store, registry(), Duration::from_secs(60));

        // tenant 1 has no record at all
        let config = cache.get(1).await;
        assert_eq!(config.protocol_name, "default");
        assert_eq!(config.hide_delay_minutes, 10);

        // tenant 2's non-positive override falls back to the protocol default
        let config = cache.get(2).await;
        assert_eq!(config.hide_delay_minutes, 10);
    }

    #[tokio::test]
    async fn store_failure_degrades_to_safe_default() {
        let cache = ProtocolConfigCache::new(
            Arc::new(FailingStore),
            registry(),
            Duration::from_secs(60),
        );

        let config = cache.get(9).await;
        assert_eq!(config, ProtocolConfig::safe_default(9));
        // failures are not cached
        assert_eq!(cache.cached_len(), 0);
    }
}
