use bazaar_core::repository::OrderRepository;
use bazaar_core::{GatewayStatus, Order, PaymentCallback, PaymentStatus};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::OrderError;

/// Applies payment gateway callbacks to orders. Payment state is tracked
/// independently of fulfilment and never touches the commission ledger.
#[derive(Clone)]
pub struct PaymentReconciler {
    orders: Arc<dyn OrderRepository>,
}

impl PaymentReconciler {
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self { orders }
    }

    pub async fn apply(&self, callback: &PaymentCallback) -> Result<Order, OrderError> {
        let reference = callback.transaction_id.trim();
        if reference.is_empty() {
            return Err(OrderError::Validation("transaction_id is required".to_string()));
        }

        let status = match callback.status {
            GatewayStatus::Paid => PaymentStatus::Paid,
            GatewayStatus::Failed => PaymentStatus::Failed,
        };

        let exists = self.orders.get_order(callback.order_id).await?.is_some();
        if !exists {
            return Err(OrderError::NotFound(format!("order {}", callback.order_id)));
        }

        if self.orders.record_payment(callback.order_id, status, reference).await? {
            info!(
                "Order {} payment is now {} (ref {})",
                callback.order_id,
                status.as_str(),
                reference
            );
        } else {
            warn!(
                "Ignored {} callback for already paid order {}",
                status.as_str(),
                callback.order_id
            );
        }

        self.orders
            .get_order(callback.order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {}", callback.order_id)))
    }
}
