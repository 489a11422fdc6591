//! Fixtures shared by the unit tests of this crate.

use async_trait::async_trait;
use bazaar_core::repository::{
    LedgerRepository, NotificationSink, OrderRepository, ProductRepository, StoreError, StoreResult,
};
use bazaar_core::{
    AdminCommissionAccount, Money, Notification, Order, OrderStatus, PaymentStatus, Product, SellerAccount,
    ShippingAddress, Tracking, Transaction,
};
use bazaar_shared::Masked;
use bazaar_store::memory::MemoryStore;
use std::sync::Arc;
use uuid::Uuid;

pub fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Ayesha Khan".to_string(),
        phone: Masked::new("+92 300 1234567".to_string()),
        street: Masked::new("12 Mall Road".to_string()),
        city: "Lahore".to_string(),
        postal_code: "54000".to_string(),
        country: "PK".to_string(),
    }
}

pub async fn seed_product(store: &MemoryStore, seller_id: Uuid, price: i64, stock: i64) -> Product {
    let product = Product::new(seller_id, "Multani pottery", Money::from_minor(price), stock);
    store.upsert_product(&product).await.unwrap();
    product
}

pub struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn deliver(&self, _notification: &Notification) -> StoreResult<()> {
        Err(StoreError::Backend("sink offline".to_string()))
    }
}

/// Order store whose inserts always fail.
pub struct BrokenInserts(pub Arc<MemoryStore>);

#[async_trait]
impl OrderRepository for BrokenInserts {
    async fn insert_order(&self, _order: &Order, _transactions: &[Transaction]) -> StoreResult<()> {
        Err(StoreError::Backend("connection reset".to_string()))
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        self.0.get_order(id).await
    }

    async fn list_orders_for_customer(&self, customer_id: Uuid) -> StoreResult<Vec<Order>> {
        self.0.list_orders_for_customer(customer_id).await
    }

    async fn list_orders_for_seller(&self, seller_id: Uuid) -> StoreResult<Vec<Order>> {
        self.0.list_orders_for_seller(seller_id).await
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        tracking: Option<&Tracking>,
    ) -> StoreResult<bool> {
        self.0.transition_status(id, from, to, tracking).await
    }

    async fn update_tracking(&self, id: Uuid, tracking: &Tracking) -> StoreResult<bool> {
        self.0.update_tracking(id, tracking).await
    }

    async fn record_payment(&self, id: Uuid, status: PaymentStatus, reference: &str) -> StoreResult<bool> {
        self.0.record_payment(id, status, reference).await
    }
}

/// Ledger whose settlement step always fails.
pub struct BrokenSettlement(pub Arc<MemoryStore>);

#[async_trait]
impl LedgerRepository for BrokenSettlement {
    async fn transactions_for_order(&self, order_id: Uuid) -> StoreResult<Vec<Transaction>> {
        self.0.transactions_for_order(order_id).await
    }

    async fn settle_order(&self, _order_id: Uuid) -> StoreResult<Vec<Transaction>> {
        Err(StoreError::Backend("deadlock detected".to_string()))
    }

    async fn void_order(&self, order_id: Uuid) -> StoreResult<Option<Vec<Transaction>>> {
        self.0.void_order(order_id).await
    }

    async fn seller_account(&self, seller_id: Uuid) -> StoreResult<SellerAccount> {
        self.0.seller_account(seller_id).await
    }

    async fn admin_account(&self) -> StoreResult<AdminCommissionAccount> {
        self.0.admin_account().await
    }
}
