//! In-process store used by tests and by `storage.backend = "memory"`.
//!
//! Every trait method takes the single state lock for its whole body, which
//! gives each call the same all-or-nothing behaviour as a database transaction.

use async_trait::async_trait;
use bazaar_core::ledger::{AdminCommissionAccount, SellerAccount, Transaction, TransactionStatus};
use bazaar_core::notification::Notification;
use bazaar_core::order::{Order, OrderStatus, PaymentStatus, Tracking};
use bazaar_core::product::Product;
use bazaar_core::repository::{
    LedgerRepository, NotificationRepository, NotificationSink, OrderRepository, ProductRepository,
    StockDecrement, StoreError, StoreResult,
};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    transactions: Vec<Transaction>,
    sellers: HashMap<Uuid, SellerAccount>,
    admin: AdminCommissionAccount,
    notifications: Vec<Notification>,
}

impl MemoryState {
    fn seller_mut(&mut self, seller_id: Uuid) -> &mut SellerAccount {
        self.sellers
            .entry(seller_id)
            .or_insert_with(|| SellerAccount::empty(seller_id))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn upsert_product(&self, product: &Product) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let state = self.state.lock().await;
        Ok(state.products.get(&id).cloned())
    }

    async fn decrement_stock(&self, id: Uuid, quantity: u32) -> StoreResult<StockDecrement> {
        let mut state = self.state.lock().await;
        let Some(product) = state.products.get_mut(&id) else {
            return Ok(StockDecrement::UnknownProduct);
        };

        let quantity = i64::from(quantity);
        if product.stock < quantity {
            return Ok(StockDecrement::Insufficient { available: product.stock });
        }

        product.stock -= quantity;
        product.updated_at = Utc::now();
        Ok(StockDecrement::Reserved { remaining: product.stock })
    }

    async fn increment_stock(&self, id: Uuid, quantity: u32) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let product = state
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("product {}", id)))?;
        product.stock += i64::from(quantity);
        product.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert_order(&self, order: &Order, transactions: &[Transaction]) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.orders.contains_key(&order.id) {
            return Err(StoreError::Backend(format!("duplicate order id {}", order.id)));
        }

        state.orders.insert(order.id, order.clone());
        for tx in transactions {
            state.seller_mut(tx.seller_id).apply(&tx.pending_delta());
            state.transactions.push(tx.clone());
        }
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.get(&id).cloned())
    }

    async fn list_orders_for_customer(&self, customer_id: Uuid) -> StoreResult<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| order.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_orders_for_seller(&self, seller_id: Uuid) -> StoreResult<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| order.involves_seller(seller_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        tracking: Option<&Tracking>,
    ) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("order {}", id)))?;

        if order.status != from {
            return Ok(false);
        }

        if let Some(tracking) = tracking {
            order.apply_tracking(tracking);
        }
        order.apply_status(to);
        Ok(true)
    }

    async fn update_tracking(&self, id: Uuid, tracking: &Tracking) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("order {}", id)))?;

        if !matches!(order.status, OrderStatus::Pending | OrderStatus::Shipped) {
            return Ok(false);
        }

        order.apply_tracking(tracking);
        Ok(true)
    }

    async fn record_payment(&self, id: Uuid, status: PaymentStatus, reference: &str) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("order {}", id)))?;

        if order.payment_status == PaymentStatus::Paid {
            return Ok(false);
        }

        order.payment_status = status;
        order.payment_reference = Some(reference.to_string());
        order.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl LedgerRepository for MemoryStore {
    async fn transactions_for_order(&self, order_id: Uuid) -> StoreResult<Vec<Transaction>> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .filter(|tx| tx.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn settle_order(&self, order_id: Uuid) -> StoreResult<Vec<Transaction>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let now = Utc::now();
        let mut settled = Vec::new();

        for tx in state
            .transactions
            .iter_mut()
            .filter(|tx| tx.order_id == order_id && tx.status == TransactionStatus::Pending)
        {
            state
                .sellers
                .entry(tx.seller_id)
                .or_insert_with(|| SellerAccount::empty(tx.seller_id))
                .apply(&tx.settlement_delta());
            state.admin.total_commission_earned += tx.commission;
            state.admin.updated_at = now;

            tx.status = TransactionStatus::Completed;
            tx.settled_at = Some(now);
            settled.push(tx.clone());
        }

        Ok(settled)
    }

    async fn void_order(&self, order_id: Uuid) -> StoreResult<Option<Vec<Transaction>>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::NotFound(format!("order {}", order_id)))?;
        if order.status != OrderStatus::Pending {
            return Ok(None);
        }
        order.apply_status(OrderStatus::Cancelled);

        let mut voided = Vec::new();
        for tx in state
            .transactions
            .iter_mut()
            .filter(|tx| tx.order_id == order_id && tx.status == TransactionStatus::Pending)
        {
            state
                .sellers
                .entry(tx.seller_id)
                .or_insert_with(|| SellerAccount::empty(tx.seller_id))
                .apply(&tx.void_delta());
            tx.status = TransactionStatus::Voided;
            voided.push(tx.clone());
        }

        Ok(Some(voided))
    }

    async fn seller_account(&self, seller_id: Uuid) -> StoreResult<SellerAccount> {
        let state = self.state.lock().await;
        Ok(state
            .sellers
            .get(&seller_id)
            .cloned()
            .unwrap_or_else(|| SellerAccount::empty(seller_id)))
    }

    async fn admin_account(&self) -> StoreResult<AdminCommissionAccount> {
        let state = self.state.lock().await;
        Ok(state.admin.clone())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn list_notifications(&self, recipient_id: Uuid) -> StoreResult<Vec<Notification>> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationSink for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn deliver(&self, notification: &Notification) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.notifications.push(notification.clone());
        Ok(())
    }
}
