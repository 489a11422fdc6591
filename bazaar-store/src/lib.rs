pub mod app_config;
pub mod database;
pub mod memory;
pub mod catalog_repo;
pub mod order_repo;
pub mod ledger_repo;
pub mod notification_repo;
pub mod redis_repo;
pub mod events;

use bazaar_core::repository::{
    LedgerRepository, NotificationRepository, NotificationSink, OrderRepository, ProductRepository,
};
use std::sync::Arc;

pub use database::DbClient;
pub use events::EventProducer;
pub use memory::MemoryStore;
pub use redis_repo::RedisClient;

/// One handle per repository trait, all backed by the same storage.
#[derive(Clone)]
pub struct Repositories {
    pub products: Arc<dyn ProductRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub ledger: Arc<dyn LedgerRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    /// Persists notifications so `notifications` can read them back.
    pub notification_sink: Arc<dyn NotificationSink>,
}

impl Repositories {
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            products: store.clone(),
            orders: store.clone(),
            ledger: store.clone(),
            notifications: store.clone(),
            notification_sink: store,
        }
    }

    pub fn postgres(db: &DbClient) -> Self {
        let notifications = Arc::new(notification_repo::StoreNotificationRepository::new(db.pool.clone()));
        Self {
            products: Arc::new(catalog_repo::StoreProductRepository::new(db.pool.clone())),
            orders: Arc::new(order_repo::StoreOrderRepository::new(db.pool.clone())),
            ledger: Arc::new(ledger_repo::StoreLedgerRepository::new(db.pool.clone())),
            notifications: notifications.clone(),
            notification_sink: notifications,
        }
    }
}
