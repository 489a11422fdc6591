use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::state::AppState;

/// Prometheus counters for the order flow, scraped via `/metrics`.
pub struct Metrics {
    registry: Registry,
    pub orders_created: IntCounter,
    pub orders_rejected: IntCounterVec,
    pub settlements: IntCounter,
    pub commission_settled: IntCounter,
    pub notification_failures: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("bazaar_orders_created_total", "Orders successfully placed")?;
        registry.register(Box::new(orders_created.clone()))?;

        let orders_rejected = IntCounterVec::new(
            Opts::new("bazaar_orders_rejected_total", "Checkouts rejected, by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(orders_rejected.clone()))?;

        let settlements = IntCounter::new("bazaar_settlements_total", "Orders settled on delivery")?;
        registry.register(Box::new(settlements.clone()))?;

        let commission_settled = IntCounter::new(
            "bazaar_commission_settled_minor_total",
            "Platform commission settled, in currency minor units",
        )?;
        registry.register(Box::new(commission_settled.clone()))?;

        let notification_failures = IntCounterVec::new(
            Opts::new("bazaar_notification_failures_total", "Failed notification deliveries, by sink"),
            &["sink"],
        )?;
        registry.register(Box::new(notification_failures.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            orders_rejected,
            settlements,
            commission_settled,
            notification_failures,
        })
    }

    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
