use uuid::Uuid;

/// Wire shape of a user-facing notification published to the event bus.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct NotificationEnvelope {
    pub notification_id: Uuid,
    pub recipient_id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub timestamp: i64,
}

impl NotificationEnvelope {
    /// Partition key: all notifications of one recipient stay ordered.
    pub fn key(&self) -> String {
        self.recipient_id.to_string()
    }
}
