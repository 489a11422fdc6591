use async_trait::async_trait;
use bazaar_core::notification::Notification;
use bazaar_core::repository::{NotificationRepository, NotificationSink, StoreError, StoreResult};
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreNotificationRepository {
    pool: PgPool,
}

impl StoreNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_id: Uuid,
    kind: String,
    payload: serde_json::Value,
    read: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
impl NotificationRepository for StoreNotificationRepository {
    async fn list_notifications(&self, recipient_id: Uuid) -> StoreResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            "SELECT id, recipient_id, kind, payload, read, created_at FROM notifications WHERE recipient_id = $1 ORDER BY created_at DESC LIMIT 100",
        )
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter()
            .map(|row| {
                Ok(Notification {
                    id: row.id,
                    recipient_id: row.recipient_id,
                    kind: row.kind.parse().map_err(StoreError::Corrupt)?,
                    payload: row.payload,
                    read: row.read,
                    created_at: row.created_at,
                })
            })
            .collect()
    }
}

#[async_trait]
impl NotificationSink for StoreNotificationRepository {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn deliver(&self, notification: &Notification) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, kind, payload, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(notification.id)
        .bind(notification.recipient_id)
        .bind(notification.kind.as_str())
        .bind(&notification.payload)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }
}
