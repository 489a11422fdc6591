use bazaar_catalog::{InventoryError, ProductError};
use bazaar_core::repository::StoreError;
use bazaar_core::OrderStatus;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Seller {seller_id} cannot purchase their own product {product_id}")]
    SelfPurchase {
        seller_id: Uuid,
        product_id: Uuid,
    },

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: u32,
        available: i64,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Tracking of order {order_id} can no longer change: order is {status}")]
    TrackingClosed {
        order_id: Uuid,
        status: OrderStatus,
    },

    #[error("Settlement failed for order {order_id}: {reason}")]
    Settlement {
        order_id: Uuid,
        reason: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrderError {
    /// Stable, machine-readable code for API clients and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation_error",
            OrderError::SelfPurchase { .. } => "self_purchase",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::Unauthorized(_) => "unauthorized",
            OrderError::NotFound(_) => "not_found",
            OrderError::InvalidTransition { .. } | OrderError::TrackingClosed { .. } => "invalid_transition",
            OrderError::Settlement { .. } => "settlement_error",
            OrderError::Store(_) => "store_error",
        }
    }
}

impl From<InventoryError> for OrderError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::NotFound(id) => OrderError::NotFound(format!("product {}", id)),
            InventoryError::InsufficientInventory { product_id, requested, available } => {
                OrderError::InsufficientStock { product_id, requested, available }
            }
            InventoryError::InvalidQuantity(id) => {
                OrderError::Validation(format!("quantity must be at least 1 for product {}", id))
            }
            InventoryError::Store(e) => OrderError::Store(e),
        }
    }
}

impl From<ProductError> for OrderError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::NotFound(id) => OrderError::NotFound(format!("product {}", id)),
            ProductError::NotAvailable(id) => OrderError::Validation(format!("product {} is not available", id)),
            ProductError::Store(e) => OrderError::Store(e),
        }
    }
}
