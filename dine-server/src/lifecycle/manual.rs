//! Manual protocol — automatic cleanup never acts
//!
//! 由员工在前台手动清理；自动周期对这些租户整体跳过。手动重置
//! 动作来自清理周期之外，所以 `on_table_reset` 钩子保持可调用。

use shared::order::Order;

use super::{HideDecision, LifecycleProtocol, ProtocolConfig, ResetDecision};

pub struct ManualProtocol;

impl LifecycleProtocol for ManualProtocol {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn default_hide_delay_minutes(&self) -> i64 {
        // never used by the decision, kept for config display
        10
    }

    fn should_hide(&self, _order: &Order, _config: &ProtocolConfig) -> HideDecision {
        HideDecision::keep()
    }

    fn should_reset(&self, _table_id: i64, _remaining: &[Order]) -> ResetDecision {
        ResetDecision::keep()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use shared::order::OrderStatus;

    #[test]
    fn never_hides_even_ancient_orders() {
        let now = Utc::now();
        let order = Order {
            id: 1,
            order_number: "#1".into(),
            table_id: 1,
            restaurant_id: 1,
            status: OrderStatus::Served,
            hidden: false,
            served_at: Some(now - Duration::hours(10)),
            created_at: now - Duration::hours(11),
            updated_at: now,
            session_id: None,
        };
        let config = ProtocolConfig {
            restaurant_id: 1,
            protocol_name: "manual".into(),
            hide_delay_minutes: 10,
        };

        assert!(!ManualProtocol.should_hide(&order, &config).hide);
        assert!(!ManualProtocol.should_reset(1, &[]).reset);
    }

    #[test]
    fn reset_hook_stays_invokable() {
        assert!(ManualProtocol.on_table_reset(4).is_ok());
    }
}
