use async_trait::async_trait;
use bazaar_core::ledger::{AccountDelta, AdminCommissionAccount, SellerAccount, Transaction};
use bazaar_core::repository::{LedgerRepository, StoreError, StoreResult};
use bazaar_core::Money;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub struct StoreLedgerRepository {
    pool: PgPool,
}

impl StoreLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    order_id: Uuid,
    seller_id: Uuid,
    product_id: Uuid,
    amount_minor: i64,
    commission_minor: i64,
    seller_share_minor: i64,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    settled_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: row.id,
            order_id: row.order_id,
            seller_id: row.seller_id,
            product_id: row.product_id,
            amount: Money::from_minor(row.amount_minor),
            commission: Money::from_minor(row.commission_minor),
            seller_share: Money::from_minor(row.seller_share_minor),
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            created_at: row.created_at,
            settled_at: row.settled_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SellerAccountRow {
    seller_id: Uuid,
    balance_minor: i64,
    pending_earnings_minor: i64,
    total_earnings_minor: i64,
    commission_paid_minor: i64,
    updated_at: chrono::DateTime<chrono::Utc>,
}

const TRANSACTION_COLUMNS: &str = "id, order_id, seller_id, product_id, amount_minor, commission_minor, \
     seller_share_minor, status, created_at, settled_at";

pub(crate) async fn insert_transaction(conn: &mut PgConnection, tx: &Transaction) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions (id, order_id, seller_id, product_id, amount_minor, commission_minor,
                                  seller_share_minor, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(tx.id)
    .bind(tx.order_id)
    .bind(tx.seller_id)
    .bind(tx.product_id)
    .bind(tx.amount.minor())
    .bind(tx.commission.minor())
    .bind(tx.seller_share.minor())
    .bind(tx.status.as_str())
    .bind(tx.created_at)
    .execute(conn)
    .await
    .map_err(StoreError::backend)?;

    Ok(())
}

/// Atomic in-place increments; the account row is created on first use.
pub(crate) async fn apply_account_delta(conn: &mut PgConnection, seller_id: Uuid, delta: &AccountDelta) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO seller_accounts (seller_id, balance_minor, pending_earnings_minor, total_earnings_minor, commission_paid_minor)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (seller_id) DO UPDATE
        SET balance_minor = seller_accounts.balance_minor + EXCLUDED.balance_minor,
            pending_earnings_minor = seller_accounts.pending_earnings_minor + EXCLUDED.pending_earnings_minor,
            total_earnings_minor = seller_accounts.total_earnings_minor + EXCLUDED.total_earnings_minor,
            commission_paid_minor = seller_accounts.commission_paid_minor + EXCLUDED.commission_paid_minor,
            updated_at = NOW()
        "#,
    )
    .bind(seller_id)
    .bind(delta.balance.minor())
    .bind(delta.pending_earnings.minor())
    .bind(delta.total_earnings.minor())
    .bind(delta.commission_paid.minor())
    .execute(conn)
    .await
    .map_err(StoreError::backend)?;

    Ok(())
}

async fn lock_pending(conn: &mut PgConnection, order_id: Uuid) -> StoreResult<Vec<Transaction>> {
    // FOR UPDATE serialises concurrent settle/void calls on the same order;
    // the loser re-checks `status` after the lock and sees nothing pending.
    let rows = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {} FROM transactions WHERE order_id = $1 AND status = 'pending' ORDER BY created_at, id FOR UPDATE",
        TRANSACTION_COLUMNS
    ))
    .bind(order_id)
    .fetch_all(conn)
    .await
    .map_err(StoreError::backend)?;

    rows.into_iter().map(Transaction::try_from).collect()
}

#[async_trait]
impl LedgerRepository for StoreLedgerRepository {
    async fn transactions_for_order(&self, order_id: Uuid) -> StoreResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE order_id = $1 ORDER BY created_at, id",
            TRANSACTION_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn settle_order(&self, order_id: Uuid) -> StoreResult<Vec<Transaction>> {
        let mut db_tx = self.pool.begin().await.map_err(StoreError::backend)?;

        let pending = lock_pending(&mut *db_tx, order_id).await?;
        let mut settled = Vec::with_capacity(pending.len());

        for mut tx in pending {
            apply_account_delta(&mut *db_tx, tx.seller_id, &tx.settlement_delta()).await?;

            sqlx::query(
                "UPDATE admin_commission_account SET total_commission_earned_minor = total_commission_earned_minor + $1, updated_at = NOW() WHERE id = 1",
            )
            .bind(tx.commission.minor())
            .execute(&mut *db_tx)
            .await
            .map_err(StoreError::backend)?;

            let settled_at: chrono::DateTime<chrono::Utc> = sqlx::query_scalar(
                "UPDATE transactions SET status = 'completed', settled_at = NOW() WHERE id = $1 RETURNING settled_at",
            )
            .bind(tx.id)
            .fetch_one(&mut *db_tx)
            .await
            .map_err(StoreError::backend)?;

            tx.status = bazaar_core::TransactionStatus::Completed;
            tx.settled_at = Some(settled_at);
            settled.push(tx);
        }

        db_tx.commit().await.map_err(StoreError::backend)?;
        Ok(settled)
    }

    async fn void_order(&self, order_id: Uuid) -> StoreResult<Option<Vec<Transaction>>> {
        let mut db_tx = self.pool.begin().await.map_err(StoreError::backend)?;

        let flipped = sqlx::query(
            "UPDATE orders SET status = 'cancelled', cancelled_at = NOW(), updated_at = NOW() WHERE id = $1 AND status = 'pending'",
        )
        .bind(order_id)
        .execute(&mut *db_tx)
        .await
        .map_err(StoreError::backend)?;

        if flipped.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
                .bind(order_id)
                .fetch_one(&mut *db_tx)
                .await
                .map_err(StoreError::backend)?;
            if !exists {
                return Err(StoreError::NotFound(format!("order {}", order_id)));
            }
            return Ok(None);
        }

        let pending = lock_pending(&mut *db_tx, order_id).await?;
        let mut voided = Vec::with_capacity(pending.len());

        for mut tx in pending {
            apply_account_delta(&mut *db_tx, tx.seller_id, &tx.void_delta()).await?;

            sqlx::query("UPDATE transactions SET status = 'voided' WHERE id = $1")
                .bind(tx.id)
                .execute(&mut *db_tx)
                .await
                .map_err(StoreError::backend)?;

            tx.status = bazaar_core::TransactionStatus::Voided;
            voided.push(tx);
        }

        db_tx.commit().await.map_err(StoreError::backend)?;
        Ok(Some(voided))
    }

    async fn seller_account(&self, seller_id: Uuid) -> StoreResult<SellerAccount> {
        let row = sqlx::query_as::<_, SellerAccountRow>(
            r#"
            SELECT seller_id, balance_minor, pending_earnings_minor, total_earnings_minor, commission_paid_minor, updated_at
            FROM seller_accounts WHERE seller_id = $1
            "#,
        )
        .bind(seller_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(match row {
            Some(row) => SellerAccount {
                seller_id: row.seller_id,
                balance: Money::from_minor(row.balance_minor),
                pending_earnings: Money::from_minor(row.pending_earnings_minor),
                total_earnings: Money::from_minor(row.total_earnings_minor),
                commission_paid: Money::from_minor(row.commission_paid_minor),
                updated_at: row.updated_at,
            },
            None => SellerAccount::empty(seller_id),
        })
    }

    async fn admin_account(&self) -> StoreResult<AdminCommissionAccount> {
        let row: Option<(i64, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
            "SELECT total_commission_earned_minor, updated_at FROM admin_commission_account WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(match row {
            Some((total, updated_at)) => AdminCommissionAccount {
                total_commission_earned: Money::from_minor(total),
                updated_at,
            },
            None => AdminCommissionAccount::default(),
        })
    }
}
