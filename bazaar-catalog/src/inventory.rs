use bazaar_core::repository::{ProductRepository, StockDecrement, StoreError};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-product stock counter backed by the product store.
///
/// Every decrement is a single conditional update in the store, so concurrent
/// checkouts of the same product can never drive stock below zero.
#[derive(Clone)]
pub struct StockLedger {
    products: Arc<dyn ProductRepository>,
}

impl StockLedger {
    pub fn new(products: Arc<dyn ProductRepository>) -> Self {
        Self { products }
    }

    /// Take `quantity` units out of stock, or fail without changing anything.
    pub async fn reserve(&self, product_id: Uuid, quantity: u32) -> Result<i64, InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity(product_id.to_string()));
        }

        match self.products.decrement_stock(product_id, quantity).await? {
            StockDecrement::Reserved { remaining } => {
                debug!("Reserved {} of product {}, {} left", quantity, product_id, remaining);
                Ok(remaining)
            }
            StockDecrement::Insufficient { available } => {
                warn!(
                    "Insufficient stock for product {}: requested {}, available {}",
                    product_id, quantity, available
                );
                Err(InventoryError::InsufficientInventory {
                    product_id,
                    requested: quantity,
                    available,
                })
            }
            StockDecrement::UnknownProduct => Err(InventoryError::NotFound(product_id.to_string())),
        }
    }

    /// Compensating increment for a reservation that did not end in a live order.
    pub async fn release(&self, product_id: Uuid, quantity: u32) -> Result<(), InventoryError> {
        self.products.increment_stock(product_id, quantity).await?;
        debug!("Released {} of product {}", quantity, product_id);
        Ok(())
    }

    pub async fn available(&self, product_id: Uuid) -> Result<i64, InventoryError> {
        self.products
            .get_product(product_id)
            .await?
            .map(|product| product.stock)
            .ok_or_else(|| InventoryError::NotFound(product_id.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Inventory not found: {0}")]
    NotFound(String),

    #[error("Insufficient inventory for {product_id}: requested {requested}, available {available}")]
    InsufficientInventory {
        product_id: Uuid,
        requested: u32,
        available: i64,
    },

    #[error("Quantity must be at least 1 for {0}")]
    InvalidQuantity(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
