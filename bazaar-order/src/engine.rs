use bazaar_catalog::{ProductCatalog, StockLedger};
use bazaar_core::repository::{LedgerRepository, OrderRepository, ProductRepository};
use bazaar_core::{
    Actor, AdminCommissionAccount, Order, PaymentCallback, Role, SellerAccount, Tracking, Transaction,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::commission::CommissionCalculator;
use crate::error::OrderError;
use crate::factory::{Checkout, OrderFactory};
use crate::notify::{NotificationDispatcher, Outcome};
use crate::payments::PaymentReconciler;
use crate::settlement::SettlementLedger;
use crate::status::{OrderStatusMachine, StatusChange, Transitioned};

/// How effects are handed to the dispatcher once an operation commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Spawned on the runtime; the caller does not wait.
    Detached,
    /// Awaited before returning. Used where delivery order must be observable.
    Inline,
}

/// Entry point for every order operation. Checks the caller's role, runs the
/// operation and dispatches the notifications it produced.
#[derive(Clone)]
pub struct OrderEngine {
    factory: OrderFactory,
    status: OrderStatusMachine,
    settlement: SettlementLedger,
    payments: PaymentReconciler,
    orders: Arc<dyn OrderRepository>,
    dispatcher: NotificationDispatcher,
    mode: DispatchMode,
}

impl OrderEngine {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        orders: Arc<dyn OrderRepository>,
        ledger: Arc<dyn LedgerRepository>,
        calculator: CommissionCalculator,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        let stock = StockLedger::new(products.clone());
        let settlement = SettlementLedger::new(ledger, calculator);
        Self {
            factory: OrderFactory::new(
                ProductCatalog::new(products),
                stock.clone(),
                orders.clone(),
                settlement.clone(),
            ),
            status: OrderStatusMachine::new(orders.clone(), settlement.clone(), stock),
            settlement,
            payments: PaymentReconciler::new(orders.clone()),
            orders,
            dispatcher,
            mode: DispatchMode::Detached,
        }
    }

    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub async fn place_order(&self, actor: Actor, checkout: Checkout) -> Result<Order, OrderError> {
        if actor.role != Role::Customer {
            return Err(OrderError::Unauthorized("only customers can place orders".to_string()));
        }
        let outcome = self.factory.create_order(actor.user_id, checkout).await?;
        Ok(self.finish(outcome).await)
    }

    pub async fn change_status(&self, change: StatusChange) -> Result<Transitioned, OrderError> {
        let outcome = self.status.update_status(change).await?;
        Ok(self.finish(outcome).await)
    }

    pub async fn cancel_order(&self, order_id: Uuid, actor: Actor) -> Result<Order, OrderError> {
        let outcome = self.status.cancel(order_id, actor).await?;
        Ok(self.finish(outcome).await)
    }

    pub async fn update_tracking(&self, order_id: Uuid, actor: Actor, tracking: Tracking) -> Result<Order, OrderError> {
        self.status.update_tracking(order_id, actor, tracking).await
    }

    pub async fn apply_payment(&self, callback: &PaymentCallback) -> Result<Order, OrderError> {
        self.payments.apply(callback).await
    }

    /// Visible to the owning customer, any seller on the order, and admins.
    pub async fn order_for(&self, actor: Actor, order_id: Uuid) -> Result<Order, OrderError> {
        let order = self.load(order_id).await?;
        let visible = match actor.role {
            Role::Admin => true,
            Role::Customer => order.customer_id == actor.user_id,
            Role::Seller => order.involves_seller(actor.user_id),
        };
        if visible {
            Ok(order)
        } else {
            Err(OrderError::Unauthorized(format!("order {} is not visible to {}", order_id, actor.user_id)))
        }
    }

    pub async fn customer_orders(&self, actor: Actor) -> Result<Vec<Order>, OrderError> {
        require_role(&actor, Role::Customer)?;
        Ok(self.orders.list_orders_for_customer(actor.user_id).await?)
    }

    pub async fn seller_orders(&self, actor: Actor) -> Result<Vec<Order>, OrderError> {
        require_role(&actor, Role::Seller)?;
        Ok(self.orders.list_orders_for_seller(actor.user_id).await?)
    }

    pub async fn order_transactions(&self, actor: Actor, order_id: Uuid) -> Result<Vec<Transaction>, OrderError> {
        let order = self.load(order_id).await?;
        let allowed = actor.is_admin() || (actor.role == Role::Seller && order.involves_seller(actor.user_id));
        if !allowed {
            return Err(OrderError::Unauthorized(format!(
                "transactions of order {} are not visible to {}",
                order_id, actor.user_id
            )));
        }

        let transactions = self.settlement.transactions_for(order_id).await?;
        if actor.is_admin() {
            Ok(transactions)
        } else {
            Ok(transactions.into_iter().filter(|tx| tx.seller_id == actor.user_id).collect())
        }
    }

    pub async fn seller_account(&self, actor: Actor) -> Result<SellerAccount, OrderError> {
        require_role(&actor, Role::Seller)?;
        self.settlement.seller_account(actor.user_id).await
    }

    pub async fn admin_account(&self, actor: Actor) -> Result<AdminCommissionAccount, OrderError> {
        require_role(&actor, Role::Admin)?;
        self.settlement.admin_account().await
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    async fn load(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {}", order_id)))
    }

    async fn finish<T>(&self, outcome: Outcome<T>) -> T {
        match self.mode {
            DispatchMode::Detached => self.dispatcher.dispatch_detached(outcome.effects),
            DispatchMode::Inline => self.dispatcher.dispatch(outcome.effects).await,
        }
        outcome.value
    }
}

fn require_role(actor: &Actor, role: Role) -> Result<(), OrderError> {
    if actor.role == role {
        Ok(())
    } else {
        Err(OrderError::Unauthorized(format!("requires role {}", role.as_str())))
    }
}
