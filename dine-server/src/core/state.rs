//! 服务器状态装配
//!
//! [`ServerState`] 持有所有服务的共享引用并负责依赖注入：存储、连接
//! 注册表、事件广播、生命周期引擎、实时连接管理器。使用 Arc 实现浅
//! 拷贝，所有权成本极低。

use std::sync::Arc;

use crate::auth::{AuthProvider, MockAuthProvider};
use crate::broadcast::RealtimeBroadcaster;
use crate::core::config::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::lifecycle::{
    CleanupScheduler, ProtocolConfigCache, ProtocolManager, ProtocolRegistry,
};
use crate::realtime::{ConnectionManager, ConnectionRegistry, HandlerContext};
use crate::store::{MemoryStore, OrderStore, TableStore, TenantStore};
use crate::utils::AppResult;

/// 服务器状态 - 持有所有服务的单例引用
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | connections | 实时连接管理器 |
/// | scheduler | 生命周期清理调度器 |
/// | protocol_manager | 清理引擎 |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub connections: Arc<ConnectionManager>,
    pub scheduler: Arc<CleanupScheduler>,
    pub protocol_manager: Arc<ProtocolManager>,
}

impl ServerState {
    /// 装配整个服务依赖图
    ///
    /// 存储和认证是协作方接口；这里注入内存实现，生产部署换成真实
    /// 后端时只动这一处。
    pub async fn initialize(config: &Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::with_backends(
            config,
            store.clone(),
            store.clone(),
            store,
            Arc::new(MockAuthProvider::new()),
        )
    }

    /// 用显式后端装配（测试和自定义部署入口）
    pub fn with_backends(
        config: &Config,
        orders: Arc<dyn OrderStore>,
        tables: Arc<dyn TableStore>,
        tenants: Arc<dyn TenantStore>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Arc::new(RealtimeBroadcaster::new(registry.clone()));

        let protocols = Arc::new(ProtocolRegistry::new());
        let config_cache =
            ProtocolConfigCache::new(tenants, protocols.clone(), config.config_cache_ttl);
        let protocol_manager = Arc::new(ProtocolManager::new(
            protocols,
            config_cache,
            orders.clone(),
            broadcaster,
        ));
        let scheduler = Arc::new(CleanupScheduler::new(
            protocol_manager.clone(),
            config.cleanup_interval,
        ));

        let ctx = Arc::new(HandlerContext {
            registry,
            orders,
            tables,
            auth,
        });
        let connections =
            ConnectionManager::new(ctx, config.heartbeat_sweep, config.heartbeat_timeout);

        Self {
            config: config.clone(),
            connections,
            scheduler,
            protocol_manager,
        }
    }

    /// 启动所有后台任务：accept 循环、心跳巡检、清理调度器
    pub async fn start_background_tasks(&self) -> AppResult<BackgroundTasks> {
        let mut tasks = BackgroundTasks::new();

        let listener = tokio::net::TcpListener::bind(&self.config.listen_addr)
            .await
            .map_err(|e| {
                crate::utils::AppError::internal(format!(
                    "Failed to bind {}: {}",
                    self.config.listen_addr, e
                ))
            })?;

        let manager = self.connections.clone();
        tasks.spawn("realtime_server", TaskKind::Worker, async move {
            manager.serve(listener).await;
        });

        let sweeper = self.connections.clone();
        tasks.spawn("heartbeat_sweep", TaskKind::Periodic, async move {
            sweeper.run_heartbeat_sweep().await;
        });

        self.scheduler.start();

        Ok(tasks)
    }

    /// 停止调度器和所有连接
    pub async fn shutdown(&self) {
        self.scheduler.stop().await;
        self.connections.shutdown();
    }
}
