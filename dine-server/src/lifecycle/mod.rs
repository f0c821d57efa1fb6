//! Order lifecycle protocols (生命周期协议)
//!
//! 可插拔的租户级策略，回答两个问题：
//!
//! 1. 这个订单现在应该对顾客隐藏吗？
//! 2. 这张桌台现在可以报告“可迎接下一位客人”吗？
//!
//! ```text
//!         ┌──────────────────────────┐
//!         │  LifecycleProtocol Trait │  ◄── 可插拔接口
//!         └────────────┬─────────────┘
//!                      │
//!     ┌────────────────┼────────────────┐
//!     ▼                ▼                ▼
//! DefaultProtocol  QuickTurnProtocol  ManualProtocol
//! (10 分钟延迟)    (5 分钟延迟)       (从不自动)
//! ```
//!
//! Built-ins are a closed enum ([`ProtocolKind`]); additional strategies
//! plug in through [`ProtocolRegistry::register`]. Unknown names fall
//! back to the default protocol with a warning, never an error.

mod config_cache;
mod default;
mod manager;
mod manual;
mod quick_turn;
mod scheduler;

pub use config_cache::{ProtocolConfig, ProtocolConfigCache};
pub use default::DefaultProtocol;
pub use manager::{CleanupReport, ProtocolManager};
pub use manual::ManualProtocol;
pub use quick_turn::QuickTurnProtocol;
pub use scheduler::CleanupScheduler;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use shared::order::{Order, OrderStatus};

use crate::utils::AppResult;

/// Outcome of a hide check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HideDecision {
    pub hide: bool,
    pub reason: Option<&'static str>,
}

impl HideDecision {
    pub fn hide(reason: &'static str) -> Self {
        Self {
            hide: true,
            reason: Some(reason),
        }
    }

    pub fn keep() -> Self {
        Self {
            hide: false,
            reason: None,
        }
    }
}

/// Outcome of a table reset check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetDecision {
    pub reset: bool,
    pub message: Option<String>,
}

impl ResetDecision {
    pub fn reset(message: impl Into<String>) -> Self {
        Self {
            reset: true,
            message: Some(message.into()),
        }
    }

    pub fn keep() -> Self {
        Self {
            reset: false,
            message: None,
        }
    }
}

/// A named, stateless per-tenant decision strategy
pub trait LifecycleProtocol: Send + Sync {
    /// Unique wire name (`default`, `quick_turn`, ...)
    fn name(&self) -> &'static str;

    /// Minutes after Served before an order becomes eligible to hide
    fn default_hide_delay_minutes(&self) -> i64;

    fn should_hide(&self, order: &Order, config: &ProtocolConfig) -> HideDecision;

    /// `remaining` is every order still attached to the table; the
    /// protocol itself decides which of them block a reset.
    fn should_reset(&self, table_id: i64, remaining: &[Order]) -> ResetDecision;

    /// Side-effect hook, invoked synchronously after the store commit.
    /// Errors are logged by the caller, never fatal to the cycle.
    fn on_order_hidden(&self, _order: &Order) -> AppResult<()> {
        Ok(())
    }

    /// Side-effect hook for a table reset. Must stay invokable even for
    /// protocols that never reset automatically (manual resets arrive
    /// from outside the cleanup cycle).
    fn on_table_reset(&self, _table_id: i64) -> AppResult<()> {
        Ok(())
    }
}

/// The three built-in strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    Default,
    QuickTurn,
    Manual,
}

impl ProtocolKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "default" => Some(ProtocolKind::Default),
            "quick_turn" => Some(ProtocolKind::QuickTurn),
            "manual" => Some(ProtocolKind::Manual),
            _ => None,
        }
    }

    pub fn protocol(&self) -> Arc<dyn LifecycleProtocol> {
        match self {
            ProtocolKind::Default => Arc::new(DefaultProtocol),
            ProtocolKind::QuickTurn => Arc::new(QuickTurnProtocol),
            ProtocolKind::Manual => Arc::new(ManualProtocol),
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolKind::Default => write!(f, "default"),
            ProtocolKind::QuickTurn => write!(f, "quick_turn"),
            ProtocolKind::Manual => write!(f, "manual"),
        }
    }
}

/// Protocol lookup: built-ins first, then registered extensions,
/// then the default protocol as fallback
pub struct ProtocolRegistry {
    custom: HashMap<String, Arc<dyn LifecycleProtocol>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self {
            custom: HashMap::new(),
        }
    }

    /// Register an extension protocol. Built-in names cannot be
    /// overridden; the built-in always wins at resolve time.
    pub fn register(&mut self, protocol: Arc<dyn LifecycleProtocol>) {
        self.custom.insert(protocol.name().to_string(), protocol);
    }

    pub fn resolve(&self, name: &str) -> Arc<dyn LifecycleProtocol> {
        if let Some(kind) = ProtocolKind::from_name(name) {
            return kind.protocol();
        }
        if let Some(protocol) = self.custom.get(name) {
            return protocol.clone();
        }
        tracing::warn!(
            protocol = %name,
            "Unknown lifecycle protocol, falling back to default"
        );
        ProtocolKind::Default.protocol()
    }

    /// Default hide delay of a named protocol (used when the tenant has
    /// no override configured)
    pub fn default_delay_for(&self, name: &str) -> i64 {
        self.resolve(name).default_hide_delay_minutes()
    }
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared hide check for the time-based strategies
///
/// 前置条件：status=Served 且 hidden=false。served_at 为空的 Served
/// 订单永不隐藏，这是上游数据不一致的防线。
pub(crate) fn timed_hide_decision(
    order: &Order,
    config: &ProtocolConfig,
    reason: &'static str,
) -> HideDecision {
    if order.status != OrderStatus::Served || order.hidden {
        return HideDecision::keep();
    }
    let Some(served_at) = order.served_at else {
        tracing::warn!(
            order_id = order.id,
            "Served order without served_at timestamp, skipping hide check"
        );
        return HideDecision::keep();
    };

    let elapsed = chrono::Utc::now().signed_duration_since(served_at);
    if elapsed >= chrono::Duration::minutes(config.hide_delay_minutes) {
        HideDecision::hide(reason)
    } else {
        HideDecision::keep()
    }
}

/// Shared reset check: a table resets when no remaining order is both
/// visible and non-cancelled
pub(crate) fn no_active_orders_reset(table_id: i64, remaining: &[Order]) -> ResetDecision {
    let blocking = remaining.iter().any(|o| o.is_active());
    if blocking {
        ResetDecision::keep()
    } else {
        tracing::debug!(table_id, "Table has no active orders left");
        ResetDecision::reset("Table is ready for the next guest")
    }
}
