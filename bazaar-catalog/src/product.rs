use bazaar_core::repository::{ProductRepository, StoreError};
use bazaar_core::Product;
use std::sync::Arc;
use uuid::Uuid;

/// Read-side lookups against the product catalog.
#[derive(Clone)]
pub struct ProductCatalog {
    products: Arc<dyn ProductRepository>,
}

impl ProductCatalog {
    pub fn new(products: Arc<dyn ProductRepository>) -> Self {
        Self { products }
    }

    /// Fetch a product that can currently be purchased.
    pub async fn purchasable(&self, product_id: Uuid) -> Result<Product, ProductError> {
        let product = self
            .products
            .get_product(product_id)
            .await?
            .ok_or_else(|| ProductError::NotFound(product_id.to_string()))?;

        if !product.is_active {
            return Err(ProductError::NotAvailable(product_id.to_string()));
        }

        Ok(product)
    }
}

/// Product-related errors
#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("Product not found: {0}")]
    NotFound(String),

    #[error("Product not available: {0}")]
    NotAvailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::Money;
    use bazaar_store::memory::MemoryStore;

    #[tokio::test]
    async fn test_inactive_products_are_not_purchasable() {
        let store = Arc::new(MemoryStore::new());
        let mut product = Product::new(Uuid::new_v4(), "Brass lamp", Money::from_minor(1_200), 3);
        product.is_active = false;
        store.upsert_product(&product).await.unwrap();

        let catalog = ProductCatalog::new(store);

        assert!(matches!(catalog.purchasable(product.id).await, Err(ProductError::NotAvailable(_))));
        assert!(matches!(catalog.purchasable(Uuid::new_v4()).await, Err(ProductError::NotFound(_))));
    }
}
