//! Table and tenant settings models (桌台/租户配置)

use serde::{Deserialize, Serialize};

/// Dining table entity (桌台)
///
/// Read-only from the lifecycle engine's perspective. A table reset is
/// a notification, never a persisted state on this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: i64,
    pub restaurant_id: i64,
    /// QR identifier customers scan to open a table session
    pub qr_ident: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Lifecycle settings on the tenant record
///
/// Both fields are optional in the store; the engine substitutes the
/// protocol's own defaults when they are absent or non-positive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantProtocolSettings {
    /// `default` | `quick_turn` | `manual`
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub hide_delay_minutes: Option<i64>,
}
