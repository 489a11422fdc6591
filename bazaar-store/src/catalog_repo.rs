use async_trait::async_trait;
use bazaar_core::repository::{ProductRepository, StockDecrement, StoreError, StoreResult};
use bazaar_core::{Money, Product};
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreProductRepository {
    pool: PgPool,
}

impl StoreProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    seller_id: Uuid,
    name: String,
    price_minor: i64,
    stock: i64,
    is_active: bool,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            seller_id: row.seller_id,
            name: row.name,
            price: Money::from_minor(row.price_minor),
            stock: row.stock,
            is_active: row.is_active,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl ProductRepository for StoreProductRepository {
    async fn upsert_product(&self, product: &Product) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, seller_id, name, price_minor, stock, is_active, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, price_minor = EXCLUDED.price_minor, stock = EXCLUDED.stock,
                is_active = EXCLUDED.is_active, updated_at = NOW()
            "#,
        )
        .bind(product.id)
        .bind(product.seller_id)
        .bind(&product.name)
        .bind(product.price.minor())
        .bind(product.stock)
        .bind(product.is_active)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, seller_id, name, price_minor, stock, is_active, updated_at FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(row.map(Product::from))
    }

    async fn decrement_stock(&self, id: Uuid, quantity: u32) -> StoreResult<StockDecrement> {
        let quantity = i64::from(quantity);

        // Check and decrement in one statement; never read-then-write.
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        if let Some(remaining) = remaining {
            return Ok(StockDecrement::Reserved { remaining });
        }

        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(match available {
            Some(available) => StockDecrement::Insufficient { available },
            None => StockDecrement::UnknownProduct,
        })
    }

    async fn increment_stock(&self, id: Uuid, quantity: u32) -> StoreResult<()> {
        let result = sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(i64::from(quantity))
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("product {}", id)));
        }
        Ok(())
    }
}
