use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use bazaar_shared::pii::Masked;
use std::fmt;
use std::str::FromStr;

use crate::money::Money;

/// Order status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// The complete transition table. Anything not listed here is illegal,
    /// including staying in the same state.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash_on_delivery" => Ok(PaymentMethod::CashOnDelivery),
            "card" => Ok(PaymentMethod::Card),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            other => Err(format!("unknown payment method: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: Masked<String>,
    pub street: Masked<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Names of required fields that are empty or whitespace only.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.full_name.trim().is_empty() {
            missing.push("full_name");
        }
        if self.phone.is_blank() {
            missing.push("phone");
        }
        if self.street.is_blank() {
            missing.push("street");
        }
        if self.city.trim().is_empty() {
            missing.push("city");
        }
        if self.postal_code.trim().is_empty() {
            missing.push("postal_code");
        }
        if self.country.trim().is_empty() {
            missing.push("country");
        }
        missing
    }
}

/// Carrier details a seller attaches when shipping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tracking {
    pub tracking_number: String,
    pub courier: String,
}

/// One product within an order. Price and seller are snapshots taken at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn line_total(&self) -> Money {
        // Lines are only built through checked arithmetic in the order factory.
        Money::from_minor(self.unit_price.minor() * i64::from(self.quantity))
    }
}

/// The single source of truth for a customer's purchase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub lines: Vec<OrderLine>,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub shipping_address: ShippingAddress,
    pub tracking_number: Option<String>,
    pub courier: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(
        customer_id: Uuid,
        lines: Vec<OrderLine>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        let total = lines.iter().map(OrderLine::line_total).sum();
        Self {
            id: Uuid::new_v4(),
            customer_id,
            lines,
            total,
            status: OrderStatus::Pending,
            payment_method,
            payment_status: PaymentStatus::Unpaid,
            payment_reference: None,
            shipping_address,
            tracking_number: None,
            courier: None,
            created_at: now,
            updated_at: now,
            delivered_at: None,
            cancelled_at: None,
        }
    }

    /// True if `seller_id` fulfils at least one line of this order.
    pub fn involves_seller(&self, seller_id: Uuid) -> bool {
        self.lines.iter().any(|line| line.seller_id == seller_id)
    }

    /// Distinct sellers in first-seen order.
    pub fn seller_ids(&self) -> Vec<Uuid> {
        let mut sellers = Vec::new();
        for line in &self.lines {
            if !sellers.contains(&line.seller_id) {
                sellers.push(line.seller_id);
            }
        }
        sellers
    }

    /// Apply a status change that the store has already committed.
    pub fn apply_status(&mut self, status: OrderStatus) {
        let now = Utc::now();
        match status {
            OrderStatus::Delivered => self.delivered_at = Some(now),
            OrderStatus::Cancelled => self.cancelled_at = Some(now),
            _ => {}
        }
        self.status = status;
        self.updated_at = now;
    }

    pub fn apply_tracking(&mut self, tracking: &Tracking) {
        self.tracking_number = Some(tracking.tracking_number.clone());
        self.courier = Some(tracking.courier.clone());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(seller_id: Uuid, quantity: u32, price: i64) -> OrderLine {
        OrderLine {
            product_id: Uuid::new_v4(),
            seller_id,
            product_name: "Item".to_string(),
            quantity,
            unit_price: Money::from_minor(price),
        }
    }

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Pending.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Delivered.can_transition_to(Shipped));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Shipped.can_transition_to(Shipped));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn test_total_and_sellers() {
        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        let order = Order::new(
            Uuid::new_v4(),
            vec![line(s1, 2, 100), line(s2, 1, 50), line(s1, 1, 10)],
            ShippingAddress::default(),
            PaymentMethod::CashOnDelivery,
        );

        assert_eq!(order.total, Money::from_minor(260));
        assert_eq!(order.seller_ids(), vec![s1, s2]);
        assert!(order.involves_seller(s2));
        assert!(!order.involves_seller(order.customer_id));
    }

    #[test]
    fn test_missing_address_fields() {
        let address = ShippingAddress {
            full_name: "Ayesha Khan".to_string(),
            phone: Masked::new(" ".to_string()),
            street: Masked::new("12 Mall Road".to_string()),
            city: "Lahore".to_string(),
            postal_code: String::new(),
            country: "PK".to_string(),
        };

        assert_eq!(address.missing_fields(), vec!["phone", "postal_code"]);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [OrderStatus::Pending, OrderStatus::Shipped, OrderStatus::Delivered, OrderStatus::Cancelled] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("archived".parse::<OrderStatus>().is_err());
    }
}
