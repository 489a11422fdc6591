pub mod commission;
pub mod engine;
pub mod error;
pub mod factory;
pub mod notify;
pub mod payments;
pub mod settlement;
pub mod status;

#[cfg(test)]
mod testing;

pub use commission::{CommissionCalculator, CommissionSplit, DEFAULT_COMMISSION_RATE_BPS};
pub use engine::{DispatchMode, OrderEngine};
pub use error::OrderError;
pub use factory::{Checkout, CheckoutLine, OrderFactory};
pub use notify::{NotificationDispatcher, Outcome};
pub use payments::PaymentReconciler;
pub use settlement::{SettlementLedger, SettlementReceipt};
pub use status::{OrderStatusMachine, StatusChange, Transitioned};
