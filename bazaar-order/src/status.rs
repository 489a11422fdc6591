use bazaar_catalog::StockLedger;
use bazaar_core::repository::OrderRepository;
use bazaar_core::{Actor, NotificationKind, Order, OrderStatus, Role, Tracking};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::OrderError;
use crate::notify::Outcome;
use crate::settlement::{SettlementLedger, SettlementReceipt};

/// A request to move an order to `new_status`.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub order_id: Uuid,
    pub actor: Actor,
    pub new_status: OrderStatus,
    pub tracking: Option<Tracking>,
}

/// An order after a status change, with the ledger movement it caused.
#[derive(Debug, Clone)]
pub struct Transitioned {
    pub order: Order,
    /// Set only for `delivered`.
    pub settlement: Option<SettlementReceipt>,
}

/// Drives orders through `pending -> shipped -> delivered`, plus cancellation.
///
/// Every status write is a compare-and-set against the status that was
/// checked, so a request that loses a race sees `InvalidTransition`.
#[derive(Clone)]
pub struct OrderStatusMachine {
    orders: Arc<dyn OrderRepository>,
    settlement: SettlementLedger,
    stock: StockLedger,
}

impl OrderStatusMachine {
    pub fn new(orders: Arc<dyn OrderRepository>, settlement: SettlementLedger, stock: StockLedger) -> Self {
        Self { orders, settlement, stock }
    }

    pub async fn update_status(&self, change: StatusChange) -> Result<Outcome<Transitioned>, OrderError> {
        if change.new_status == OrderStatus::Cancelled {
            let outcome = self.cancel(change.order_id, change.actor).await?;
            return Ok(outcome.map(|order| Transitioned { order, settlement: None }));
        }

        let mut order = self.load(change.order_id).await?;
        authorize_fulfilment(&order, &change.actor)?;

        if !order.status.can_transition_to(change.new_status) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: change.new_status,
            });
        }

        let from = order.status;
        let mut settlement = None;
        match change.new_status {
            OrderStatus::Shipped => {
                let tracking = require_tracking(change.tracking)?;
                self.compare_and_set(&order, from, OrderStatus::Shipped, Some(&tracking)).await?;
                order.apply_tracking(&tracking);
            }
            OrderStatus::Delivered => {
                // Ledger first: a delivered order must never have pending transactions.
                let receipt = self.settlement.settle(order.id).await?;
                self.compare_and_set(&order, from, OrderStatus::Delivered, None).await?;
                info!(
                    "Order {} delivered, settled {} transactions",
                    order.id,
                    receipt.settled.len()
                );
                settlement = Some(receipt);
            }
            other => {
                return Err(OrderError::InvalidTransition { from, to: other });
            }
        }
        order.apply_status(change.new_status);

        info!("Order {} moved {} -> {} by {}", order.id, from, order.status, change.actor.user_id);

        let payload = status_payload(&order);
        let customer_id = order.customer_id;
        Ok(Outcome::new(Transitioned { order, settlement }).with_effect(
            customer_id,
            NotificationKind::OrderStatusUpdate,
            payload,
        ))
    }

    /// Cancel a pending order: void its transactions, then put the stock back.
    pub async fn cancel(&self, order_id: Uuid, actor: Actor) -> Result<Outcome<Order>, OrderError> {
        let mut order = self.load(order_id).await?;

        let allowed = match actor.role {
            Role::Admin => true,
            Role::Customer => order.customer_id == actor.user_id,
            Role::Seller => order.involves_seller(actor.user_id),
        };
        if !allowed {
            return Err(OrderError::Unauthorized(format!(
                "{} cannot cancel order {}",
                actor.user_id, order_id
            )));
        }

        if !order.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }

        if self.settlement.void(order_id).await?.is_none() {
            return Err(self.lost_race(order_id, OrderStatus::Cancelled).await);
        }

        for line in &order.lines {
            if let Err(e) = self.stock.release(line.product_id, line.quantity).await {
                error!(
                    "Failed to restore {} units of product {} for cancelled order {}: {}",
                    line.quantity, line.product_id, order_id, e
                );
            }
        }

        order.apply_status(OrderStatus::Cancelled);
        info!("Order {} cancelled by {}", order_id, actor.user_id);

        let payload = status_payload(&order);
        let mut outcome =
            Outcome::new(order.clone()).with_effect(order.customer_id, NotificationKind::OrderStatusUpdate, payload.clone());
        for seller_id in order.seller_ids() {
            outcome = outcome.with_effect(seller_id, NotificationKind::OrderStatusUpdate, payload.clone());
        }
        Ok(outcome)
    }

    /// Correct the carrier details on an order that has not reached a terminal state.
    pub async fn update_tracking(&self, order_id: Uuid, actor: Actor, tracking: Tracking) -> Result<Order, OrderError> {
        let mut order = self.load(order_id).await?;
        authorize_fulfilment(&order, &actor)?;
        let tracking = require_tracking(Some(tracking))?;

        if order.status.is_terminal() || !self.orders.update_tracking(order_id, &tracking).await? {
            let status = self.load(order_id).await.map(|o| o.status).unwrap_or(order.status);
            return Err(OrderError::TrackingClosed { order_id, status });
        }

        order.apply_tracking(&tracking);
        Ok(order)
    }

    async fn load(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {}", order_id)))
    }

    async fn compare_and_set(
        &self,
        order: &Order,
        from: OrderStatus,
        to: OrderStatus,
        tracking: Option<&Tracking>,
    ) -> Result<(), OrderError> {
        if self.orders.transition_status(order.id, from, to, tracking).await? {
            Ok(())
        } else {
            Err(self.lost_race(order.id, to).await)
        }
    }

    async fn lost_race(&self, order_id: Uuid, to: OrderStatus) -> OrderError {
        match self.load(order_id).await {
            Ok(current) => {
                warn!("Order {} changed concurrently, now {}", order_id, current.status);
                OrderError::InvalidTransition { from: current.status, to }
            }
            Err(e) => e,
        }
    }
}

fn authorize_fulfilment(order: &Order, actor: &Actor) -> Result<(), OrderError> {
    if actor.role == Role::Seller && order.involves_seller(actor.user_id) {
        Ok(())
    } else {
        Err(OrderError::Unauthorized(format!(
            "{} does not fulfil order {}",
            actor.user_id, order.id
        )))
    }
}

fn require_tracking(tracking: Option<Tracking>) -> Result<Tracking, OrderError> {
    match tracking {
        Some(t) if !t.tracking_number.trim().is_empty() && !t.courier.trim().is_empty() => Ok(Tracking {
            tracking_number: t.tracking_number.trim().to_string(),
            courier: t.courier.trim().to_string(),
        }),
        _ => Err(OrderError::Validation(
            "tracking_number and courier are required".to_string(),
        )),
    }
}

fn status_payload(order: &Order) -> serde_json::Value {
    json!({
        "order_id": order.id,
        "status": order.status,
        "tracking_number": order.tracking_number,
        "courier": order.courier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commission::CommissionCalculator;
    use crate::factory::{Checkout, CheckoutLine, OrderFactory};
    use crate::testing::{address, seed_product, BrokenSettlement};
    use bazaar_catalog::ProductCatalog;
    use bazaar_core::repository::{LedgerRepository, ProductRepository};
    use bazaar_core::{Money, PaymentMethod, TransactionStatus};
    use bazaar_store::memory::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        machine: OrderStatusMachine,
        order: Order,
        customer: Uuid,
        s1: Uuid,
        s2: Uuid,
        product_a: Uuid,
    }

    async fn fixture_with_ledger(broken_settlement: bool) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let ledger: Arc<dyn LedgerRepository> = if broken_settlement {
            Arc::new(BrokenSettlement(store.clone()))
        } else {
            store.clone()
        };
        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        let a = seed_product(&store, s1, 100, 10).await;
        let b = seed_product(&store, s2, 50, 10).await;
        let settlement = SettlementLedger::new(ledger, CommissionCalculator::default());
        let stock = StockLedger::new(store.clone());
        let factory = OrderFactory::new(ProductCatalog::new(store.clone()), stock.clone(), store.clone(), settlement.clone());
        let customer = Uuid::new_v4();

        let order = factory
            .create_order(
                customer,
                Checkout {
                    lines: vec![
                        CheckoutLine { product_id: a.id, seller_id: s1, quantity: 2, price: None },
                        CheckoutLine { product_id: b.id, seller_id: s2, quantity: 1, price: None },
                    ],
                    shipping_address: address(),
                    payment_method: PaymentMethod::CashOnDelivery,
                },
            )
            .await
            .unwrap()
            .value;

        Fixture {
            machine: OrderStatusMachine::new(store.clone(), settlement, stock),
            store,
            order,
            customer,
            s1,
            s2,
            product_a: a.id,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with_ledger(false).await
    }

    fn change(f: &Fixture, actor: Actor, new_status: OrderStatus) -> StatusChange {
        StatusChange {
            order_id: f.order.id,
            actor,
            new_status,
            tracking: None,
        }
    }

    fn ship(f: &Fixture) -> StatusChange {
        StatusChange {
            tracking: Some(Tracking {
                tracking_number: "TCS123".to_string(),
                courier: "TCS".to_string(),
            }),
            ..change(f, Actor::seller(f.s1), OrderStatus::Shipped)
        }
    }

    #[tokio::test]
    async fn test_ship_then_deliver_settles() {
        let f = fixture().await;

        let shipped = f.machine.update_status(ship(&f)).await.unwrap();
        assert_eq!(shipped.value.order.status, OrderStatus::Shipped);
        assert_eq!(shipped.value.order.tracking_number.as_deref(), Some("TCS123"));
        assert_eq!(shipped.effects.len(), 1);
        assert_eq!(shipped.effects[0].recipient_id, f.customer);

        let delivered = f
            .machine
            .update_status(change(&f, Actor::seller(f.s2), OrderStatus::Delivered))
            .await
            .unwrap();
        assert_eq!(delivered.value.order.status, OrderStatus::Delivered);
        assert!(delivered.value.order.delivered_at.is_some());
        let receipt = delivered.value.settlement.as_ref().unwrap();
        assert_eq!(receipt.settled.len(), 2);
        assert_eq!(receipt.commission, Money::from_minor(25));
        assert_eq!(delivered.effects[0].kind, NotificationKind::OrderStatusUpdate);
        assert_eq!(delivered.effects[0].payload["status"], json!("delivered"));

        let s1 = f.store.seller_account(f.s1).await.unwrap();
        assert_eq!(s1.balance, Money::from_minor(180));
        assert_eq!(s1.pending_earnings, Money::ZERO);
        assert_eq!(s1.total_earnings, Money::from_minor(200));
        assert_eq!(s1.commission_paid, Money::from_minor(20));
        assert_eq!(
            f.store.admin_account().await.unwrap().total_commission_earned,
            Money::from_minor(25)
        );

        let txs = f.store.transactions_for_order(f.order.id).await.unwrap();
        assert!(txs.iter().all(|t| t.status == TransactionStatus::Completed && t.settled_at.is_some()));
    }

    #[tokio::test]
    async fn test_illegal_transitions_rejected() {
        let f = fixture().await;
        let seller = Actor::seller(f.s1);

        let skip = f.machine.update_status(change(&f, seller, OrderStatus::Delivered)).await;
        assert!(matches!(
            skip,
            Err(OrderError::InvalidTransition { from: OrderStatus::Pending, to: OrderStatus::Delivered })
        ));

        let same = f.machine.update_status(change(&f, seller, OrderStatus::Pending)).await;
        assert!(matches!(same, Err(OrderError::InvalidTransition { .. })));

        f.machine.update_status(ship(&f)).await.unwrap();
        f.machine.update_status(change(&f, seller, OrderStatus::Delivered)).await.unwrap();

        let back = f.machine.update_status(ship(&f)).await;
        assert!(matches!(
            back,
            Err(OrderError::InvalidTransition { from: OrderStatus::Delivered, to: OrderStatus::Shipped })
        ));

        let again = f.machine.update_status(change(&f, seller, OrderStatus::Delivered)).await;
        assert!(matches!(again, Err(OrderError::InvalidTransition { .. })));
        assert_eq!(
            f.store.admin_account().await.unwrap().total_commission_earned,
            Money::from_minor(25)
        );
    }

    #[tokio::test]
    async fn test_only_fulfilling_seller_drives_status() {
        let f = fixture().await;

        let outsider = StatusChange { actor: Actor::seller(Uuid::new_v4()), ..ship(&f) };
        assert!(matches!(f.machine.update_status(outsider).await, Err(OrderError::Unauthorized(_))));

        let customer = StatusChange { actor: Actor::customer(f.customer), ..ship(&f) };
        assert!(matches!(f.machine.update_status(customer).await, Err(OrderError::Unauthorized(_))));

        let admin = StatusChange { actor: Actor::admin(Uuid::new_v4()), ..ship(&f) };
        assert!(matches!(f.machine.update_status(admin).await, Err(OrderError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_ship_requires_tracking() {
        let f = fixture().await;
        let blank = StatusChange {
            tracking: Some(Tracking { tracking_number: " ".to_string(), courier: "TCS".to_string() }),
            ..ship(&f)
        };
        assert!(matches!(f.machine.update_status(blank).await, Err(OrderError::Validation(_))));

        let none = change(&f, Actor::seller(f.s1), OrderStatus::Shipped);
        assert!(matches!(f.machine.update_status(none).await, Err(OrderError::Validation(_))));

        let order = f.store.get_order(f.order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_deliveries_settle_once() {
        let f = fixture().await;
        f.machine.update_status(ship(&f)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let machine = f.machine.clone();
            let seller = if i % 2 == 0 { f.s1 } else { f.s2 };
            let request = change(&f, Actor::seller(seller), OrderStatus::Delivered);
            handles.push(tokio::spawn(async move { machine.update_status(request).await }));
        }

        let mut delivered = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(outcome) => {
                    delivered += 1;
                    assert_eq!(outcome.value.order.status, OrderStatus::Delivered);
                }
                Err(OrderError::InvalidTransition { to: OrderStatus::Delivered, .. }) => {}
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert_eq!(delivered, 1);

        let s1 = f.store.seller_account(f.s1).await.unwrap();
        assert_eq!(s1.balance, Money::from_minor(180));
        assert_eq!(s1.pending_earnings, Money::ZERO);
        assert_eq!(f.store.seller_account(f.s2).await.unwrap().balance, Money::from_minor(45));
        assert_eq!(
            f.store.admin_account().await.unwrap().total_commission_earned,
            Money::from_minor(25)
        );
    }

    #[tokio::test]
    async fn test_settlement_failure_keeps_order_shipped() {
        let f = fixture_with_ledger(true).await;
        f.machine.update_status(ship(&f)).await.unwrap();

        let result = f
            .machine
            .update_status(change(&f, Actor::seller(f.s1), OrderStatus::Delivered))
            .await;

        assert!(matches!(result, Err(OrderError::Settlement { .. })));
        let order = f.store.get_order(f.order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        let txs = f.store.transactions_for_order(f.order.id).await.unwrap();
        assert!(txs.iter().all(|t| t.status == TransactionStatus::Pending));
        assert_eq!(f.store.seller_account(f.s1).await.unwrap().balance, Money::ZERO);
    }

    #[tokio::test]
    async fn test_cancel_voids_and_restores_stock() {
        let f = fixture().await;

        let outcome = f.machine.cancel(f.order.id, Actor::customer(f.customer)).await.unwrap();
        assert_eq!(outcome.value.status, OrderStatus::Cancelled);
        let recipients: Vec<Uuid> = outcome.effects.iter().map(|n| n.recipient_id).collect();
        assert_eq!(recipients, vec![f.customer, f.s1, f.s2]);

        assert_eq!(f.store.get_product(f.product_a).await.unwrap().unwrap().stock, 10);
        assert_eq!(f.store.seller_account(f.s1).await.unwrap().pending_earnings, Money::ZERO);
        assert_eq!(f.store.seller_account(f.s2).await.unwrap().pending_earnings, Money::ZERO);
        let txs = f.store.transactions_for_order(f.order.id).await.unwrap();
        assert!(txs.iter().all(|t| t.status == TransactionStatus::Voided));

        let twice = f.machine.cancel(f.order.id, Actor::customer(f.customer)).await;
        assert!(matches!(twice, Err(OrderError::InvalidTransition { from: OrderStatus::Cancelled, .. })));
        assert_eq!(f.store.get_product(f.product_a).await.unwrap().unwrap().stock, 10);
    }

    #[tokio::test]
    async fn test_cancel_authorization_and_state() {
        let f = fixture().await;

        let stranger = f.machine.cancel(f.order.id, Actor::customer(Uuid::new_v4())).await;
        assert!(matches!(stranger, Err(OrderError::Unauthorized(_))));

        f.machine.update_status(ship(&f)).await.unwrap();
        let shipped = f.machine.cancel(f.order.id, Actor::admin(Uuid::new_v4())).await;
        assert!(matches!(shipped, Err(OrderError::InvalidTransition { from: OrderStatus::Shipped, .. })));

        // Routed through update_status as well.
        let via_update = f
            .machine
            .update_status(change(&f, Actor::seller(f.s1), OrderStatus::Cancelled))
            .await;
        assert!(matches!(via_update, Err(OrderError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_update_tracking_until_terminal() {
        let f = fixture().await;
        let seller = Actor::seller(f.s1);
        let tracking = |n: &str| Tracking { tracking_number: n.to_string(), courier: "Leopards".to_string() };

        let order = f.machine.update_tracking(f.order.id, seller, tracking("LP1")).await.unwrap();
        assert_eq!(order.tracking_number.as_deref(), Some("LP1"));

        f.machine.update_status(ship(&f)).await.unwrap();
        f.machine.update_tracking(f.order.id, seller, tracking("LP2")).await.unwrap();
        let stored = f.store.get_order(f.order.id).await.unwrap().unwrap();
        assert_eq!(stored.tracking_number.as_deref(), Some("LP2"));
        assert_eq!(stored.courier.as_deref(), Some("Leopards"));

        f.machine.update_status(change(&f, seller, OrderStatus::Delivered)).await.unwrap();
        let late = f.machine.update_tracking(f.order.id, seller, tracking("LP3")).await;
        match late {
            Err(err @ OrderError::TrackingClosed { status: OrderStatus::Delivered, .. }) => {
                assert_eq!(err.code(), "invalid_transition");
                assert!(err.to_string().contains("can no longer change"));
            }
            other => panic!("expected closed tracking, got {:?}", other.map(|o| o.status)),
        }

        let outsider = f.machine.update_tracking(f.order.id, Actor::seller(Uuid::new_v4()), tracking("X")).await;
        assert!(matches!(outsider, Err(OrderError::Unauthorized(_))));
    }
}
