use async_trait::async_trait;
use bazaar_core::order::{Order, OrderLine, OrderStatus, PaymentStatus, ShippingAddress, Tracking};
use bazaar_core::repository::{OrderRepository, StoreError, StoreResult};
use bazaar_core::{Money, Transaction};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::ledger_repo::{apply_account_delta, insert_transaction};

pub struct StoreOrderRepository {
    pool: PgPool,
}

impl StoreOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    total_minor: i64,
    status: String,
    payment_method: String,
    payment_status: String,
    payment_reference: Option<String>,
    shipping_address: serde_json::Value,
    tracking_number: Option<String>,
    courier: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    delivered_at: Option<chrono::DateTime<chrono::Utc>>,
    cancelled_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    product_id: Uuid,
    seller_id: Uuid,
    product_name: String,
    quantity: i32,
    unit_price_minor: i64,
}

const ORDER_COLUMNS: &str = "id, customer_id, total_minor, status, payment_method, payment_status, payment_reference, \
     shipping_address, tracking_number, courier, created_at, updated_at, delivered_at, cancelled_at";

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLineRow>) -> StoreResult<Order> {
        let shipping_address: ShippingAddress = serde_json::from_value(self.shipping_address)
            .map_err(|e| StoreError::Corrupt(format!("order {} shipping address: {}", self.id, e)))?;

        let lines = lines
            .into_iter()
            .map(|line| {
                let quantity = u32::try_from(line.quantity)
                    .map_err(|_| StoreError::Corrupt(format!("order {} quantity {}", self.id, line.quantity)))?;
                Ok(OrderLine {
                    product_id: line.product_id,
                    seller_id: line.seller_id,
                    product_name: line.product_name,
                    quantity,
                    unit_price: Money::from_minor(line.unit_price_minor),
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Order {
            id: self.id,
            customer_id: self.customer_id,
            lines,
            total: Money::from_minor(self.total_minor),
            status: self.status.parse().map_err(StoreError::Corrupt)?,
            payment_method: self.payment_method.parse().map_err(StoreError::Corrupt)?,
            payment_status: self.payment_status.parse().map_err(StoreError::Corrupt)?,
            payment_reference: self.payment_reference,
            shipping_address,
            tracking_number: self.tracking_number,
            courier: self.courier,
            created_at: self.created_at,
            updated_at: self.updated_at,
            delivered_at: self.delivered_at,
            cancelled_at: self.cancelled_at,
        })
    }
}

async fn insert_order_rows(conn: &mut PgConnection, order: &Order) -> StoreResult<()> {
    let shipping_address = serde_json::to_value(&order.shipping_address)
        .map_err(|e| StoreError::Corrupt(format!("shipping address: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO orders (id, customer_id, total_minor, status, payment_method, payment_status, payment_reference,
                            shipping_address, tracking_number, courier, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(order.id)
    .bind(order.customer_id)
    .bind(order.total.minor())
    .bind(order.status.as_str())
    .bind(order.payment_method.as_str())
    .bind(order.payment_status.as_str())
    .bind(order.payment_reference.as_deref())
    .bind(shipping_address)
    .bind(order.tracking_number.as_deref())
    .bind(order.courier.as_deref())
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(StoreError::backend)?;

    for (line_no, line) in order.lines.iter().enumerate() {
        let quantity = i32::try_from(line.quantity)
            .map_err(|_| StoreError::Corrupt(format!("quantity {} out of range", line.quantity)))?;
        sqlx::query(
            r#"
            INSERT INTO order_lines (order_id, line_no, product_id, seller_id, product_name, quantity, unit_price_minor)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id)
        .bind(line_no as i32)
        .bind(line.product_id)
        .bind(line.seller_id)
        .bind(&line.product_name)
        .bind(quantity)
        .bind(line.unit_price.minor())
        .execute(&mut *conn)
        .await
        .map_err(StoreError::backend)?;
    }

    Ok(())
}

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn insert_order(&self, order: &Order, transactions: &[Transaction]) -> StoreResult<()> {
        let mut db_tx = self.pool.begin().await.map_err(StoreError::backend)?;

        insert_order_rows(&mut *db_tx, order).await?;
        for tx in transactions {
            insert_transaction(&mut *db_tx, tx).await?;
            apply_account_delta(&mut *db_tx, tx.seller_id, &tx.pending_delta()).await?;
        }

        // Dropping `db_tx` on any error above rolls everything back.
        db_tx.commit().await.map_err(StoreError::backend)?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, OrderLineRow>(
            "SELECT product_id, seller_id, product_name, quantity, unit_price_minor FROM order_lines WHERE order_id = $1 ORDER BY line_no",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.into_order(lines).map(Some)
    }

    async fn list_orders_for_customer(&self, customer_id: Uuid) -> StoreResult<Vec<Order>> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM orders WHERE customer_id = $1 ORDER BY created_at DESC")
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        self.load_all(ids).await
    }

    async fn list_orders_for_seller(&self, seller_id: Uuid) -> StoreResult<Vec<Order>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT o.id FROM orders o
            WHERE EXISTS (SELECT 1 FROM order_lines l WHERE l.order_id = o.id AND l.seller_id = $1)
            ORDER BY o.created_at DESC
            "#,
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        self.load_all(ids).await
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        tracking: Option<&Tracking>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3,
                tracking_number = COALESCE($4, tracking_number),
                courier = COALESCE($5, courier),
                delivered_at = CASE WHEN $3 = 'delivered' THEN NOW() ELSE delivered_at END,
                cancelled_at = CASE WHEN $3 = 'cancelled' THEN NOW() ELSE cancelled_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(tracking.map(|t| t.tracking_number.as_str()))
        .bind(tracking.map(|t| t.courier.as_str()))
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        self.ensure_exists(id).await?;
        Ok(false)
    }

    async fn update_tracking(&self, id: Uuid, tracking: &Tracking) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET tracking_number = $2, courier = $3, updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'shipped')
            "#,
        )
        .bind(id)
        .bind(&tracking.tracking_number)
        .bind(&tracking.courier)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        self.ensure_exists(id).await?;
        Ok(false)
    }

    async fn record_payment(&self, id: Uuid, status: PaymentStatus, reference: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET payment_status = $2, payment_reference = $3, updated_at = NOW()
            WHERE id = $1 AND payment_status <> 'paid'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(reference)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        self.ensure_exists(id).await?;
        Ok(false)
    }
}

impl StoreOrderRepository {
    async fn load_all(&self, ids: Vec<Uuid>) -> StoreResult<Vec<Order>> {
        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(order) = self.get_order(id).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    async fn ensure_exists(&self, id: Uuid) -> StoreResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        if exists {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("order {}", id)))
        }
    }
}
