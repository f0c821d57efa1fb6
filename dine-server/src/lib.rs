//! Dine Server - 多租户餐厅点餐平台的订单生命周期与实时通知引擎
//!
//! # 架构概述
//!
//! - **生命周期引擎** (`lifecycle`): 按租户策略隐藏已送达订单、重置
//!   空闲桌台
//! - **实时通道** (`realtime`): 员工端/桌台端持久连接、握手、心跳、
//!   fan-out
//! - **事件广播** (`broadcast`): 主题化 best-effort 事件投递
//! - **存储接口** (`store`): 订单/桌台/租户配置的协作方 trait
//! - **认证接口** (`auth`): 员工凭证校验的协作方 trait
//!
//! # 模块结构
//!
//! ```text
//! dine-server/src/
//! ├── core/          # 配置、状态装配、后台任务
//! ├── lifecycle/     # 协议策略、配置缓存、清理引擎、调度器
//! ├── realtime/      # 连接管理、消息分发、传输层
//! ├── broadcast/     # 事件广播
//! ├── store/         # 存储接口 + 内存实现
//! ├── auth/          # 认证接口 + mock
//! └── utils/         # 错误、日志
//! ```

pub mod auth;
pub mod broadcast;
pub mod core;
pub mod lifecycle;
pub mod realtime;
pub mod store;
pub mod utils;

// Re-export 公共类型
pub use broadcast::{ChannelBroadcaster, EventBroadcaster, RealtimeBroadcaster, Topic};
pub use core::{BackgroundTasks, Config, ServerState};
pub use lifecycle::{
    CleanupReport, CleanupScheduler, LifecycleProtocol, ProtocolKind, ProtocolManager,
    ProtocolRegistry,
};
pub use realtime::{ConnectionManager, ConnectionRegistry};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
    ____  _
   / __ \(_)___  ___
  / / / / / __ \/ _ \
 / /_/ / / / / /  __/
/_____/_/_/ /_/\___/
   _____
  / ___/___  ______   _____  _____
  \__ \/ _ \/ ___/ | / / _ \/ ___/
 ___/ /  __/ /   | |/ /  __/ /
/____/\___/_/    |___/\___/_/
    "#
    );
}
