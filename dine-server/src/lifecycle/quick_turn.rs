//! QuickTurn protocol — 5 minute hide delay
//!
//! 快翻台场景（快餐、午市）用更短的延迟回收桌台视图。

use shared::order::Order;

use super::{
    HideDecision, LifecycleProtocol, ProtocolConfig, ResetDecision, no_active_orders_reset,
    timed_hide_decision,
};

pub struct QuickTurnProtocol;

impl LifecycleProtocol for QuickTurnProtocol {
    fn name(&self) -> &'static str {
        "quick_turn"
    }

    fn default_hide_delay_minutes(&self) -> i64 {
        5
    }

    fn should_hide(&self, order: &Order, config: &ProtocolConfig) -> HideDecision {
        timed_hide_decision(order, config, "quick_turn_expired")
    }

    fn should_reset(&self, table_id: i64, remaining: &[Order]) -> ResetDecision {
        no_active_orders_reset(table_id, remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use shared::order::OrderStatus;

    #[test]
    fn uses_distinct_reason_code() {
        let now = Utc::now();
        let order = Order {
            id: 9,
            order_number: "#9".into(),
            table_id: 1,
            restaurant_id: 1,
            status: OrderStatus::Served,
            hidden: false,
            served_at: Some(now - Duration::minutes(6)),
            created_at: now,
            updated_at: now,
            session_id: None,
        };
        let config = ProtocolConfig {
            restaurant_id: 1,
            protocol_name: "quick_turn".into(),
            hide_delay_minutes: 5,
        };

        let decision = QuickTurnProtocol.should_hide(&order, &config);
        assert!(decision.hide);
        assert_eq!(decision.reason, Some("quick_turn_expired"));
    }
}
