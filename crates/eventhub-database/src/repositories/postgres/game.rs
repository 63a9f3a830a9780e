//! PostgreSQL game catalog repository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use eventhub_core::result::AppResult;
use eventhub_entity::game::Game;

use crate::error::map_sqlx;
use crate::repositories::GameRepository;

/// Game catalog backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgGameRepository {
    pool: PgPool,
}

impl PgGameRepository {
    /// Create a new game repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GameRepository for PgGameRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Game>> {
        sqlx::query_as::<_, Game>("SELECT * FROM games WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "Failed to find game"))
    }
}
