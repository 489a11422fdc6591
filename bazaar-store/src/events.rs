use async_trait::async_trait;
use bazaar_core::notification::Notification;
use bazaar_core::repository::{NotificationSink, StoreError, StoreResult};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
    topic: String,
}

impl EventProducer {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }

    pub async fn publish(&self, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(&self.topic)
            .key(key)
            .payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                debug!(
                    "Sent message to {}/{}: partition {} offset {}",
                    self.topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", self.topic, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl NotificationSink for EventProducer {
    fn name(&self) -> &'static str {
        "kafka"
    }

    async fn deliver(&self, notification: &Notification) -> StoreResult<()> {
        let envelope = notification.to_envelope();
        let payload = serde_json::to_string(&envelope)
            .map_err(|e| StoreError::Corrupt(format!("notification {}: {}", notification.id, e)))?;

        self.publish(&envelope.key(), &payload)
            .await
            .map_err(StoreError::backend)
    }
}
