//! Default protocol — 10 minute hide delay

use shared::order::Order;

use super::{
    HideDecision, LifecycleProtocol, ProtocolConfig, ResetDecision, no_active_orders_reset,
    timed_hide_decision,
};

/// Standard dine-in pacing: orders linger ten minutes after service so
/// customers can still check what arrived.
pub struct DefaultProtocol;

impl LifecycleProtocol for DefaultProtocol {
    fn name(&self) -> &'static str {
        "default"
    }

    fn default_hide_delay_minutes(&self) -> i64 {
        10
    }

    fn should_hide(&self, order: &Order, config: &ProtocolConfig) -> HideDecision {
        timed_hide_decision(order, config, "expired")
    }

    fn should_reset(&self, table_id: i64, remaining: &[Order]) -> ResetDecision {
        no_active_orders_reset(table_id, remaining)
    }
}
