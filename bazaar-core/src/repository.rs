use async_trait::async_trait;
use uuid::Uuid;

use crate::ledger::{AdminCommissionAccount, SellerAccount, Transaction};
use crate::notification::Notification;
use crate::order::{Order, OrderStatus, PaymentStatus, Tracking};
use crate::product::Product;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Stored record is corrupt: {0}")]
    Corrupt(String),

    #[error("Storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    Reserved { remaining: i64 },
    Insufficient { available: i64 },
    UnknownProduct,
}

/// Repository trait for product catalog access
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn upsert_product(&self, product: &Product) -> StoreResult<()>;

    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>>;

    /// Decrements stock by `quantity` only if at least `quantity` is available,
    /// as a single atomic operation.
    async fn decrement_stock(&self, id: Uuid, quantity: u32) -> StoreResult<StockDecrement>;

    async fn increment_stock(&self, id: Uuid, quantity: u32) -> StoreResult<()>;
}

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists the order, its pending transactions and the matching
    /// `pending_earnings` increments as one unit. Nothing is written on error.
    async fn insert_order(&self, order: &Order, transactions: &[Transaction]) -> StoreResult<()>;

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>>;

    async fn list_orders_for_customer(&self, customer_id: Uuid) -> StoreResult<Vec<Order>>;

    async fn list_orders_for_seller(&self, seller_id: Uuid) -> StoreResult<Vec<Order>>;

    /// Compare-and-set on the status column. Returns `false` when the order
    /// was not in `from`. Tracking fields, when given, are written in the same update.
    async fn transition_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        tracking: Option<&Tracking>,
    ) -> StoreResult<bool>;

    /// Overwrites tracking fields while the order is pending or shipped.
    /// Returns `false` when the order is in any other status.
    async fn update_tracking(&self, id: Uuid, tracking: &Tracking) -> StoreResult<bool>;

    /// Records a gateway outcome unless the order is already paid.
    /// Returns `false` when nothing changed.
    async fn record_payment(&self, id: Uuid, status: PaymentStatus, reference: &str) -> StoreResult<bool>;
}

/// Repository trait for the commission ledger
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn transactions_for_order(&self, order_id: Uuid) -> StoreResult<Vec<Transaction>>;

    /// Flips every `pending` transaction of the order to `completed` and
    /// applies the seller and platform increments in one atomic step.
    /// Returns the transactions settled by this call (empty on re-invocation).
    async fn settle_order(&self, order_id: Uuid) -> StoreResult<Vec<Transaction>>;

    /// Moves the order from `pending` to `cancelled`, flips its pending
    /// transactions to `voided` and reverses their `pending_earnings`, atomically.
    /// Returns `None` when the order was not pending.
    async fn void_order(&self, order_id: Uuid) -> StoreResult<Option<Vec<Transaction>>>;

    /// All-zero account when the seller has never sold anything.
    async fn seller_account(&self, seller_id: Uuid) -> StoreResult<SellerAccount>;

    async fn admin_account(&self) -> StoreResult<AdminCommissionAccount>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn list_notifications(&self, recipient_id: Uuid) -> StoreResult<Vec<Notification>>;
}

/// A best-effort destination for user-facing notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, notification: &Notification) -> StoreResult<()>;
}
