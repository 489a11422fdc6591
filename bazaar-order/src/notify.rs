use bazaar_core::repository::NotificationSink;
use bazaar_core::{Notification, NotificationKind};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// The result of a committed operation plus the notifications it produced.
/// Effects are only handed to the dispatcher after the state change is durable.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub effects: Vec<Notification>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self { value, effects: Vec::new() }
    }

    pub fn with_effect(mut self, recipient_id: Uuid, kind: NotificationKind, payload: serde_json::Value) -> Self {
        self.effects.push(Notification::new(recipient_id, kind, payload));
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            effects: self.effects,
        }
    }
}

type FailureHook = Arc<dyn Fn(&'static str) + Send + Sync>;

/// Fans notifications out to every configured sink. Delivery is best-effort:
/// a failing sink is logged and counted, never surfaced to the caller.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    sinks: Vec<Arc<dyn NotificationSink>>,
    on_failure: Option<FailureHook>,
}

impl NotificationDispatcher {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks, on_failure: None }
    }

    /// Called with the sink name for every failed delivery.
    pub fn with_failure_hook(mut self, hook: impl Fn(&'static str) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Arc::new(hook));
        self
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|sink| sink.name()).collect()
    }

    pub async fn dispatch(&self, effects: Vec<Notification>) {
        for notification in &effects {
            for sink in &self.sinks {
                match sink.deliver(notification).await {
                    Ok(()) => debug!(
                        "Delivered {} notification {} to {} via {}",
                        notification.kind.as_str(),
                        notification.id,
                        notification.recipient_id,
                        sink.name()
                    ),
                    Err(e) => {
                        warn!(
                            "Failed to deliver {} notification {} via {}: {}",
                            notification.kind.as_str(),
                            notification.id,
                            sink.name(),
                            e
                        );
                        if let Some(hook) = &self.on_failure {
                            hook(sink.name());
                        }
                    }
                }
            }
        }
    }

    /// Deliver on a background task so the caller's response is not held up.
    pub fn dispatch_detached(&self, effects: Vec<Notification>) {
        if effects.is_empty() {
            return;
        }
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.dispatch(effects).await;
        });
    }

    /// Send a single notification outside of an order operation.
    pub async fn notify(&self, recipient_id: Uuid, kind: NotificationKind, payload: serde_json::Value) {
        self.dispatch(vec![Notification::new(recipient_id, kind, payload)]).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FailingSink;
    use bazaar_core::repository::NotificationRepository;
    use bazaar_store::memory::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_failing_sink_does_not_block_others() {
        let store = Arc::new(MemoryStore::new());
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = failures.clone();
        let sinks: Vec<Arc<dyn NotificationSink>> = vec![Arc::new(FailingSink), store.clone()];
        let dispatcher = NotificationDispatcher::new(sinks).with_failure_hook(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let recipient = Uuid::new_v4();

        dispatcher
            .notify(recipient, NotificationKind::OrderReceived, json!({ "order_id": Uuid::new_v4() }))
            .await;

        assert_eq!(failures.load(Ordering::SeqCst), 1);
        let stored = store.list_notifications(recipient).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].kind, NotificationKind::OrderReceived);
        assert!(!stored[0].read);
    }

    #[test]
    fn test_outcome_collects_effects() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let outcome = Outcome::new(7)
            .with_effect(a, NotificationKind::OrderReceived, json!({}))
            .with_effect(b, NotificationKind::OrderStatusUpdate, json!({}));

        assert_eq!(outcome.value, 7);
        let recipients: Vec<Uuid> = outcome.effects.iter().map(|n| n.recipient_id).collect();
        assert_eq!(recipients, vec![a, b]);
    }
}
