use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use bazaar_shared::models::events::NotificationEnvelope;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// To a seller, when an order containing their products is placed.
    OrderReceived,
    /// To a customer, when their order changes status.
    OrderStatusUpdate,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::OrderReceived => "order_received",
            NotificationKind::OrderStatusUpdate => "order_status_update",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order_received" => Ok(NotificationKind::OrderReceived),
            "order_status_update" => Ok(NotificationKind::OrderStatusUpdate),
            other => Err(format!("unknown notification kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(recipient_id: Uuid, kind: NotificationKind, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            kind,
            payload,
            read: false,
            created_at: Utc::now(),
        }
    }

    pub fn to_envelope(&self) -> NotificationEnvelope {
        NotificationEnvelope {
            notification_id: self.id,
            recipient_id: self.recipient_id,
            kind: self.kind.as_str().to_string(),
            payload: self.payload.clone(),
            timestamp: self.created_at.timestamp(),
        }
    }
}
