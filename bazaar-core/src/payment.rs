use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome reported by the payment gateway.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Paid,
    Failed,
}

/// Gateway callback body. Treated as opaque beyond these fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCallback {
    pub order_id: Uuid,
    pub status: GatewayStatus,
    pub transaction_id: String,
}
