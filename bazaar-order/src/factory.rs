use bazaar_catalog::{ProductCatalog, StockLedger};
use bazaar_core::repository::OrderRepository;
use bazaar_core::{Money, NotificationKind, Order, OrderLine, PaymentMethod, ShippingAddress};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::OrderError;
use crate::notify::Outcome;
use crate::settlement::SettlementLedger;

/// Largest quantity a single line may carry; matches the `INTEGER` column.
pub const MAX_LINE_QUANTITY: u32 = i32::MAX as u32;

/// One requested line of a checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutLine {
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub quantity: u32,
    /// Price the client saw, in minor units. Checked against the catalog.
    #[serde(default)]
    pub price: Option<Money>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Checkout {
    pub lines: Vec<CheckoutLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

/// Turns a checkout into a pending order with stock reserved and commission
/// transactions recorded.
#[derive(Clone)]
pub struct OrderFactory {
    catalog: ProductCatalog,
    stock: StockLedger,
    orders: Arc<dyn OrderRepository>,
    settlement: SettlementLedger,
}

impl OrderFactory {
    pub fn new(
        catalog: ProductCatalog,
        stock: StockLedger,
        orders: Arc<dyn OrderRepository>,
        settlement: SettlementLedger,
    ) -> Self {
        Self { catalog, stock, orders, settlement }
    }

    pub async fn create_order(&self, customer_id: Uuid, checkout: Checkout) -> Result<Outcome<Order>, OrderError> {
        let lines = self.resolve_lines(customer_id, &checkout).await?;

        let mut reserved: Vec<(Uuid, u32)> = Vec::with_capacity(lines.len());
        for line in &lines {
            if let Err(e) = self.stock.reserve(line.product_id, line.quantity).await {
                self.release_all(&reserved).await;
                return Err(e.into());
            }
            reserved.push((line.product_id, line.quantity));
        }

        let order = Order::new(customer_id, lines, checkout.shipping_address, checkout.payment_method);
        let transactions = self.settlement.record_pending(&order);

        if let Err(e) = self.orders.insert_order(&order, &transactions).await {
            error!("Failed to persist order {}: {}", order.id, e);
            self.release_all(&reserved).await;
            return Err(e.into());
        }

        info!(
            "Created order {} for customer {}: {} lines, total {}",
            order.id,
            customer_id,
            order.lines.len(),
            order.total
        );

        let mut outcome = Outcome::new(order.clone());
        for seller_id in order.seller_ids() {
            let seller_lines: Vec<&OrderLine> = order.lines.iter().filter(|l| l.seller_id == seller_id).collect();
            let amount: Money = seller_lines.iter().map(|l| l.line_total()).sum();
            outcome = outcome.with_effect(
                seller_id,
                NotificationKind::OrderReceived,
                json!({
                    "order_id": order.id,
                    "items": seller_lines.iter().map(|l| json!({
                        "product_id": l.product_id,
                        "product_name": l.product_name,
                        "quantity": l.quantity,
                    })).collect::<Vec<_>>(),
                    "amount": amount,
                }),
            );
        }

        Ok(outcome)
    }

    /// Validate the whole checkout against the catalog before any stock moves.
    async fn resolve_lines(&self, customer_id: Uuid, checkout: &Checkout) -> Result<Vec<OrderLine>, OrderError> {
        if checkout.lines.is_empty() {
            return Err(OrderError::Validation("order must contain at least one line".to_string()));
        }

        let missing = checkout.shipping_address.missing_fields();
        if !missing.is_empty() {
            return Err(OrderError::Validation(format!(
                "shipping address is missing: {}",
                missing.join(", ")
            )));
        }

        let mut total = Money::ZERO;
        let mut lines = Vec::with_capacity(checkout.lines.len());
        for requested in &checkout.lines {
            if requested.quantity == 0 {
                return Err(OrderError::Validation(format!(
                    "quantity must be at least 1 for product {}",
                    requested.product_id
                )));
            }
            if requested.quantity > MAX_LINE_QUANTITY {
                return Err(OrderError::Validation(format!(
                    "quantity {} exceeds {} for product {}",
                    requested.quantity, MAX_LINE_QUANTITY, requested.product_id
                )));
            }

            let product = self.catalog.purchasable(requested.product_id).await?;

            if product.seller_id != requested.seller_id {
                return Err(OrderError::Validation(format!(
                    "product {} is not sold by {}",
                    product.id, requested.seller_id
                )));
            }

            if product.seller_id == customer_id {
                warn!("Rejected self-purchase of product {} by {}", product.id, customer_id);
                return Err(OrderError::SelfPurchase {
                    seller_id: customer_id,
                    product_id: product.id,
                });
            }

            if let Some(price) = requested.price {
                if price != product.price {
                    return Err(OrderError::Validation(format!(
                        "price of product {} changed from {} to {}",
                        product.id, price, product.price
                    )));
                }
            }

            let line_total = product
                .price
                .checked_mul(requested.quantity)
                .ok_or_else(|| OrderError::Validation(format!("line total overflows for product {}", product.id)))?;
            total = total
                .checked_add(line_total)
                .ok_or_else(|| OrderError::Validation("order total overflows".to_string()))?;

            lines.push(OrderLine {
                product_id: product.id,
                seller_id: product.seller_id,
                product_name: product.name,
                quantity: requested.quantity,
                unit_price: product.price,
            });
        }

        Ok(lines)
    }

    async fn release_all(&self, reserved: &[(Uuid, u32)]) {
        for (product_id, quantity) in reserved {
            if let Err(e) = self.stock.release(*product_id, *quantity).await {
                error!("Failed to restore {} units of product {}: {}", quantity, product_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commission::CommissionCalculator;
    use crate::testing::{address, seed_product, BrokenInserts};
    use bazaar_core::repository::{LedgerRepository, ProductRepository};
    use bazaar_core::{OrderStatus, TransactionStatus};
    use bazaar_store::memory::MemoryStore;

    fn factory_over(store: Arc<MemoryStore>, orders: Arc<dyn OrderRepository>) -> OrderFactory {
        OrderFactory::new(
            ProductCatalog::new(store.clone()),
            StockLedger::new(store.clone()),
            orders,
            SettlementLedger::new(store, CommissionCalculator::default()),
        )
    }

    fn factory(store: &Arc<MemoryStore>) -> OrderFactory {
        factory_over(store.clone(), store.clone())
    }

    fn checkout(lines: Vec<CheckoutLine>) -> Checkout {
        Checkout {
            lines,
            shipping_address: address(),
            payment_method: PaymentMethod::CashOnDelivery,
        }
    }

    fn line(product: &bazaar_core::Product, quantity: u32) -> CheckoutLine {
        CheckoutLine {
            product_id: product.id,
            seller_id: product.seller_id,
            quantity,
            price: None,
        }
    }

    async fn stock_of(store: &MemoryStore, id: Uuid) -> i64 {
        store.get_product(id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn test_two_seller_order() {
        let store = Arc::new(MemoryStore::new());
        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        let a = seed_product(&store, s1, 100, 10).await;
        let b = seed_product(&store, s2, 50, 10).await;

        let outcome = factory(&store)
            .create_order(Uuid::new_v4(), checkout(vec![line(&a, 2), line(&b, 1)]))
            .await
            .unwrap();
        let order = outcome.value;

        assert_eq!(order.total, Money::from_minor(250));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(stock_of(&store, a.id).await, 8);
        assert_eq!(stock_of(&store, b.id).await, 9);

        let txs = store.transactions_for_order(order.id).await.unwrap();
        assert_eq!(txs.len(), 2);
        let t1 = txs.iter().find(|t| t.seller_id == s1).unwrap();
        assert_eq!((t1.amount, t1.commission, t1.seller_share), (
            Money::from_minor(200),
            Money::from_minor(20),
            Money::from_minor(180)
        ));
        let t2 = txs.iter().find(|t| t.seller_id == s2).unwrap();
        assert_eq!((t2.amount, t2.commission, t2.seller_share), (
            Money::from_minor(50),
            Money::from_minor(5),
            Money::from_minor(45)
        ));
        assert!(txs.iter().all(|t| t.status == TransactionStatus::Pending));

        assert_eq!(store.seller_account(s1).await.unwrap().pending_earnings, Money::from_minor(180));
        assert_eq!(store.seller_account(s2).await.unwrap().pending_earnings, Money::from_minor(45));

        let recipients: Vec<Uuid> = outcome.effects.iter().map(|n| n.recipient_id).collect();
        assert_eq!(recipients, vec![s1, s2]);
        assert!(outcome.effects.iter().all(|n| n.kind == NotificationKind::OrderReceived));
        assert_eq!(outcome.effects[0].payload["amount"], json!(200));
    }

    #[tokio::test]
    async fn test_self_purchase_leaves_no_trace() {
        let store = Arc::new(MemoryStore::new());
        let seller = Uuid::new_v4();
        let other = seed_product(&store, Uuid::new_v4(), 100, 5).await;
        let own = seed_product(&store, seller, 100, 5).await;

        let err = factory(&store)
            .create_order(seller, checkout(vec![line(&other, 1), line(&own, 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::SelfPurchase { product_id, .. } if product_id == own.id));
        assert_eq!(stock_of(&store, other.id).await, 5);
        assert_eq!(stock_of(&store, own.id).await, 5);
        assert!(store.list_orders_for_customer(seller).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_stock_restores_earlier_lines() {
        let store = Arc::new(MemoryStore::new());
        let a = seed_product(&store, Uuid::new_v4(), 100, 5).await;
        let b = seed_product(&store, Uuid::new_v4(), 100, 1).await;
        let customer = Uuid::new_v4();

        let err = factory(&store)
            .create_order(customer, checkout(vec![line(&a, 3), line(&b, 2)]))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::InsufficientStock { requested: 2, available: 1, .. }));
        assert_eq!(stock_of(&store, a.id).await, 5);
        assert_eq!(stock_of(&store, b.id).await, 1);
        assert!(store.list_orders_for_customer(customer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_insert_restores_stock() {
        let store = Arc::new(MemoryStore::new());
        let seller = Uuid::new_v4();
        let a = seed_product(&store, seller, 100, 4).await;
        let factory = factory_over(store.clone(), Arc::new(BrokenInserts(store.clone())));

        let err = factory
            .create_order(Uuid::new_v4(), checkout(vec![line(&a, 3)]))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Store(_)));
        assert_eq!(stock_of(&store, a.id).await, 4);
        assert_eq!(store.seller_account(seller).await.unwrap().pending_earnings, Money::ZERO);
    }

    #[tokio::test]
    async fn test_validation_rejections() {
        let store = Arc::new(MemoryStore::new());
        let a = seed_product(&store, Uuid::new_v4(), 100, 5).await;
        let factory = factory(&store);
        let customer = Uuid::new_v4();

        let empty = factory.create_order(customer, checkout(vec![])).await;
        assert!(matches!(empty, Err(OrderError::Validation(_))));

        let zero = factory.create_order(customer, checkout(vec![line(&a, 0)])).await;
        assert!(matches!(zero, Err(OrderError::Validation(_))));

        let mut no_address = checkout(vec![line(&a, 1)]);
        no_address.shipping_address.city = "  ".to_string();
        match factory.create_order(customer, no_address).await {
            Err(OrderError::Validation(msg)) => assert!(msg.contains("city")),
            other => panic!("expected validation error, got {:?}", other.map(|o| o.value.id)),
        }

        let mut wrong_seller = line(&a, 1);
        wrong_seller.seller_id = Uuid::new_v4();
        let mismatch = factory.create_order(customer, checkout(vec![wrong_seller])).await;
        assert!(matches!(mismatch, Err(OrderError::Validation(_))));

        let mut stale = line(&a, 1);
        stale.price = Some(Money::from_minor(90));
        let stale = factory.create_order(customer, checkout(vec![stale])).await;
        assert!(matches!(stale, Err(OrderError::Validation(_))));

        let mut unknown = line(&a, 1);
        unknown.product_id = Uuid::new_v4();
        let unknown = factory.create_order(customer, checkout(vec![unknown])).await;
        assert!(matches!(unknown, Err(OrderError::NotFound(_))));

        assert_eq!(stock_of(&store, a.id).await, 5);
    }

    #[tokio::test]
    async fn test_oversized_quantity_rejected_before_reserving() {
        let store = Arc::new(MemoryStore::new());
        let a = seed_product(&store, Uuid::new_v4(), 1, i64::MAX).await;

        let result = factory(&store)
            .create_order(Uuid::new_v4(), checkout(vec![line(&a, MAX_LINE_QUANTITY + 1)]))
            .await;

        assert!(matches!(result, Err(OrderError::Validation(msg)) if msg.contains("exceeds")));
        assert_eq!(stock_of(&store, a.id).await, i64::MAX);

        let at_limit = factory(&store)
            .create_order(Uuid::new_v4(), checkout(vec![line(&a, MAX_LINE_QUANTITY)]))
            .await
            .unwrap();
        assert_eq!(at_limit.value.lines[0].quantity, MAX_LINE_QUANTITY);
    }

    #[tokio::test]
    async fn test_inactive_product_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut a = seed_product(&store, Uuid::new_v4(), 100, 5).await;
        a.is_active = false;
        store.upsert_product(&a).await.unwrap();

        let result = factory(&store).create_order(Uuid::new_v4(), checkout(vec![line(&a, 1)])).await;
        assert!(matches!(result, Err(OrderError::Validation(_))));
    }

    #[tokio::test]
    async fn test_concurrent_last_unit() {
        let store = Arc::new(MemoryStore::new());
        let a = seed_product(&store, Uuid::new_v4(), 100, 1).await;
        let factory = factory(&store);

        let first = factory.create_order(Uuid::new_v4(), checkout(vec![line(&a, 1)]));
        let second = factory.create_order(Uuid::new_v4(), checkout(vec![line(&a, 1)]));
        let (first, second) = tokio::join!(first, second);

        let results = [first, second];
        let won = results.iter().filter(|r| r.is_ok()).count();
        let lost = results
            .iter()
            .filter(|r| matches!(r, Err(OrderError::InsufficientStock { .. })))
            .count();
        assert_eq!((won, lost), (1, 1));
        assert_eq!(stock_of(&store, a.id).await, 0);
    }
}
