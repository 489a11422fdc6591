use anyhow::Context;
use bazaar_api::{
    app,
    metrics::Metrics,
    state::{AppState, AuthConfig, RateLimit},
};
use bazaar_core::repository::NotificationSink;
use bazaar_order::{CommissionCalculator, NotificationDispatcher, OrderEngine};
use bazaar_store::app_config::{Config, StorageBackend};
use bazaar_store::{DbClient, EventProducer, MemoryStore, RedisClient, Repositories};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar_api=debug,bazaar_order=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Bazaar API on port {}", config.server.port);

    let repos = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database.url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Repositories::postgres(&db)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Repositories::memory(Arc::new(MemoryStore::new()))
        }
    };

    // Redis Connection
    let redis = match &config.redis.url {
        Some(url) => Some(Arc::new(RedisClient::new(url).context("Invalid Redis URL")?)),
        None => None,
    };

    let mut sinks: Vec<Arc<dyn NotificationSink>> = vec![repos.notification_sink.clone()];
    // Kafka Connection
    if let Some(brokers) = &config.kafka.brokers {
        let producer = EventProducer::new(brokers, &config.kafka.notification_topic)
            .context("Failed to create Kafka producer")?;
        sinks.push(Arc::new(producer));
    }

    let metrics = Arc::new(Metrics::new()?);
    let failures = metrics.notification_failures.clone();
    let dispatcher = NotificationDispatcher::new(sinks)
        .with_failure_hook(move |sink| failures.with_label_values(&[sink]).inc());

    let calculator = CommissionCalculator::new(config.commerce.commission_rate_bps)?;
    tracing::info!(
        "Commission rate {} bps, amounts in {}",
        calculator.rate_bps(),
        config.commerce.currency
    );
    let engine = OrderEngine::new(repos.products, repos.orders, repos.ledger, calculator, dispatcher);

    let app_state = AppState {
        engine,
        notifications: repos.notifications,
        redis,
        metrics,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        webhook_secret: config.payments.webhook_secret.clone(),
        currency: config.commerce.currency.clone(),
        rate_limit: RateLimit {
            requests_per_window: config.rate_limit.requests_per_window,
            window_seconds: config.rate_limit.window_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
