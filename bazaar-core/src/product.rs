use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::money::Money;

/// A catalog listing owned by one seller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub price: Money,
    pub stock: i64,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(seller_id: Uuid, name: impl Into<String>, price: Money, stock: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            seller_id,
            name: name.into(),
            price,
            stock,
            is_active: true,
            updated_at: Utc::now(),
        }
    }
}
