use bazaar_core::repository::NotificationRepository;
use bazaar_order::OrderEngine;
use bazaar_store::RedisClient;
use std::sync::Arc;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone, Copy)]
pub struct RateLimit {
    pub requests_per_window: i64,
    pub window_seconds: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: OrderEngine,
    pub notifications: Arc<dyn NotificationRepository>,
    /// Rate limiting is skipped when no Redis is configured.
    pub redis: Option<Arc<RedisClient>>,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
    pub webhook_secret: String,
    /// ISO 4217 code every `Money` amount on the wire is denominated in.
    pub currency: String,
    pub rate_limit: RateLimit,
}
