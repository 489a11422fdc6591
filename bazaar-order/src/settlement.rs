use bazaar_core::repository::LedgerRepository;
use bazaar_core::{AdminCommissionAccount, Money, Order, SellerAccount, Transaction, TransactionStatus};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::commission::CommissionCalculator;
use crate::error::OrderError;

/// What one call to [`SettlementLedger::settle`] moved.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementReceipt {
    pub order_id: Uuid,
    pub settled: Vec<Transaction>,
    pub commission: Money,
    pub seller_share: Money,
}

impl SettlementReceipt {
    /// True when the order had nothing left to settle.
    pub fn is_noop(&self) -> bool {
        self.settled.is_empty()
    }
}

/// Records, settles and voids the per-line commission transactions of an order.
#[derive(Clone)]
pub struct SettlementLedger {
    ledger: Arc<dyn LedgerRepository>,
    calculator: CommissionCalculator,
}

impl SettlementLedger {
    pub fn new(ledger: Arc<dyn LedgerRepository>, calculator: CommissionCalculator) -> Self {
        Self { ledger, calculator }
    }

    /// One pending transaction per order line. Persisting them is part of the
    /// order insert so the order and its ledger rows appear together.
    pub fn record_pending(&self, order: &Order) -> Vec<Transaction> {
        let now = Utc::now();
        order
            .lines
            .iter()
            .map(|line| {
                let amount = line.line_total();
                let split = self.calculator.split(amount);
                Transaction {
                    id: Uuid::new_v4(),
                    order_id: order.id,
                    seller_id: line.seller_id,
                    product_id: line.product_id,
                    amount,
                    commission: split.commission,
                    seller_share: split.seller_share,
                    status: TransactionStatus::Pending,
                    created_at: now,
                    settled_at: None,
                }
            })
            .collect()
    }

    /// Complete every pending transaction of the order. Calling this again for
    /// the same order is a no-op that returns an empty receipt.
    pub async fn settle(&self, order_id: Uuid) -> Result<SettlementReceipt, OrderError> {
        let settled = self.ledger.settle_order(order_id).await.map_err(|e| {
            error!("Settlement of order {} failed: {}", order_id, e);
            OrderError::Settlement {
                order_id,
                reason: e.to_string(),
            }
        })?;

        let commission: Money = settled.iter().map(|tx| tx.commission).sum();
        let seller_share: Money = settled.iter().map(|tx| tx.seller_share).sum();

        if !settled.is_empty() {
            info!(
                "Settled order {}: {} transactions, commission {}, seller share {}",
                order_id,
                settled.len(),
                commission,
                seller_share
            );
        }

        Ok(SettlementReceipt {
            order_id,
            settled,
            commission,
            seller_share,
        })
    }

    /// Cancel the order and void its pending transactions in one step.
    /// `None` means the order was no longer pending and nothing changed.
    pub async fn void(&self, order_id: Uuid) -> Result<Option<Vec<Transaction>>, OrderError> {
        let voided = self.ledger.void_order(order_id).await?;
        if let Some(txs) = &voided {
            info!("Voided {} pending transactions of order {}", txs.len(), order_id);
        }
        Ok(voided)
    }

    pub async fn transactions_for(&self, order_id: Uuid) -> Result<Vec<Transaction>, OrderError> {
        Ok(self.ledger.transactions_for_order(order_id).await?)
    }

    pub async fn seller_account(&self, seller_id: Uuid) -> Result<SellerAccount, OrderError> {
        Ok(self.ledger.seller_account(seller_id).await?)
    }

    pub async fn admin_account(&self) -> Result<AdminCommissionAccount, OrderError> {
        Ok(self.ledger.admin_account().await?)
    }
}
