//! PostgreSQL notification repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use eventhub_core::result::AppResult;
use eventhub_entity::notification::Notification;

use crate::error::map_sqlx;
use crate::repositories::NotificationRepository;

/// Notifications backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    /// Create a new notification repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn create_for_members(
        &self,
        event_id: Uuid,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (id, recipient_id, event_id, body, created_at) \
             SELECT gen_random_uuid(), m.user_id, m.event_id, $2, $3 \
             FROM event_members m WHERE m.event_id = $1 \
             RETURNING *",
        )
        .bind(event_id)
        .bind(body)
        .bind(created_at)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx(e, "Failed to create notifications"))
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE recipient_id = $1 \
             ORDER BY created_at DESC, id LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx(e, "Failed to list notifications"))
    }

    async fn count_for_user(&self, user_id: Uuid) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE recipient_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "Failed to count notifications"))
    }

    async fn delete_for_user(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(notification_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "Failed to delete notification"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE recipient_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "Failed to delete notifications"))?;
        Ok(result.rows_affected())
    }
}
