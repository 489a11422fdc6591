use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::str::FromStr;

use crate::money::Money;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Voided,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Voided => "voided",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "voided" => Ok(TransactionStatus::Voided),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

/// Money owed on one order line, split between seller and platform.
///
/// Invariant: `commission + seller_share == amount`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub order_id: Uuid,
    pub seller_id: Uuid,
    pub product_id: Uuid,
    pub amount: Money,
    pub commission: Money,
    pub seller_share: Money,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn is_balanced(&self) -> bool {
        self.commission + self.seller_share == self.amount
    }

    /// Account movement caused by recording this transaction as pending.
    pub fn pending_delta(&self) -> AccountDelta {
        AccountDelta {
            pending_earnings: self.seller_share,
            ..AccountDelta::default()
        }
    }

    /// Account movement caused by settling this transaction.
    pub fn settlement_delta(&self) -> AccountDelta {
        AccountDelta {
            balance: self.seller_share,
            pending_earnings: -self.seller_share,
            total_earnings: self.amount,
            commission_paid: self.commission,
        }
    }

    /// Account movement caused by voiding this transaction.
    pub fn void_delta(&self) -> AccountDelta {
        AccountDelta {
            pending_earnings: -self.seller_share,
            ..AccountDelta::default()
        }
    }
}

/// Increments applied atomically to a seller account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountDelta {
    pub balance: Money,
    pub pending_earnings: Money,
    pub total_earnings: Money,
    pub commission_paid: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SellerAccount {
    pub seller_id: Uuid,
    /// Withdrawable.
    pub balance: Money,
    /// Awaiting delivery.
    pub pending_earnings: Money,
    /// Lifetime gross.
    pub total_earnings: Money,
    pub commission_paid: Money,
    pub updated_at: DateTime<Utc>,
}

impl SellerAccount {
    pub fn empty(seller_id: Uuid) -> Self {
        Self {
            seller_id,
            balance: Money::ZERO,
            pending_earnings: Money::ZERO,
            total_earnings: Money::ZERO,
            commission_paid: Money::ZERO,
            updated_at: Utc::now(),
        }
    }

    pub fn apply(&mut self, delta: &AccountDelta) {
        self.balance += delta.balance;
        self.pending_earnings += delta.pending_earnings;
        self.total_earnings += delta.total_earnings;
        self.commission_paid += delta.commission_paid;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminCommissionAccount {
    pub total_commission_earned: Money,
    pub updated_at: DateTime<Utc>,
}

impl Default for AdminCommissionAccount {
    fn default() -> Self {
        Self {
            total_commission_earned: Money::ZERO,
            updated_at: Utc::now(),
        }
    }
}
