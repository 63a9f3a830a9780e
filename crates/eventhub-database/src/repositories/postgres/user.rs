//! PostgreSQL user directory repository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use eventhub_core::result::AppResult;
use eventhub_entity::user::User;

use crate::error::map_sqlx;
use crate::repositories::UserRepository;

/// User lookups backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "Failed to find user"))
    }

    async fn find_by_telegram_username(&self, handle: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(telegram_username) = LOWER($1)")
            .bind(handle.trim_start_matches('@'))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "Failed to find user by telegram username"))
    }

    async fn set_chat_id(&self, user_id: Uuid, chat_id: Option<i64>) -> AppResult<bool> {
        let result = sqlx::query("UPDATE users SET chat_id = $2 WHERE id = $1")
            .bind(user_id)
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "Failed to update chat id"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_chat_ids(&self, user_ids: &[Uuid]) -> AppResult<Vec<(Uuid, i64)>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT id, chat_id FROM users WHERE id = ANY($1) AND chat_id IS NOT NULL",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx(e, "Failed to fetch chat ids"))
    }
}
