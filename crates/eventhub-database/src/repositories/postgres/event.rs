//! PostgreSQL event and membership repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use eventhub_core::error::AppError;
use eventhub_core::result::AppResult;
use eventhub_entity::event::{Event, Membership};
use eventhub_entity::game::Game;

use crate::error::map_sqlx;
use crate::repositories::EventRepository;

/// Events and memberships backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    /// Create a new event repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Insert the event row and the organizer's membership on `conn`.
async fn insert_with_organizer(conn: &mut PgConnection, event: &Event) -> AppResult<Event> {
    let created = sqlx::query_as::<_, Event>(
        "INSERT INTO events (id, organizer_id, body, game, capacity, starts_at, pre_notified, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(event.id)
    .bind(event.organizer_id)
    .bind(&event.body)
    .bind(&event.game)
    .bind(event.capacity)
    .bind(event.starts_at)
    .bind(event.pre_notified)
    .bind(event.created_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_sqlx(e, "Failed to create event"))?;

    sqlx::query("INSERT INTO event_members (event_id, user_id, joined_at) VALUES ($1, $2, $3)")
        .bind(event.id)
        .bind(event.organizer_id)
        .bind(event.created_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx(e, "Failed to add organizer membership"))?;

    Ok(created)
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn insert(&self, event: &Event) -> AppResult<Event> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx(e, "Failed to begin transaction"))?;

        let created = insert_with_organizer(&mut tx, event).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx(e, "Failed to commit event creation"))?;

        Ok(created)
    }

    async fn insert_for_game(&self, event: &Event, game_id: Uuid) -> AppResult<(Event, Game)> {
        let organizer_id = event.organizer_id;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx(e, "Failed to begin transaction"))?;

        let organizer: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
            .bind(organizer_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx(e, "Failed to find organizer"))?;
        if organizer.is_none() {
            return Err(AppError::not_found(format!("Organizer {organizer_id} not found")));
        }

        // Row lock serializes concurrent aggregate updates for the game.
        let mut game = sqlx::query_as::<_, Game>("SELECT * FROM games WHERE id = $1 FOR UPDATE")
            .bind(game_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx(e, "Failed to find game"))?
            .ok_or_else(|| AppError::not_found(format!("Game {game_id} not found")))?;

        let owns: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM user_games WHERE user_id = $1 AND game_id = $2)",
        )
        .bind(organizer_id)
        .bind(game_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx(e, "Failed to check game ownership"))?;
        if !owns {
            return Err(AppError::validation(format!(
                "User {organizer_id} does not own game {}",
                game.name
            )));
        }

        let event = Event {
            game: game.name.clone(),
            ..event.clone()
        };
        let created = insert_with_organizer(&mut tx, &event).await?;

        game.record_event();
        let game = sqlx::query_as::<_, Game>(
            "UPDATE games SET number_of_events = $2, rating = $3 WHERE id = $1 RETURNING *",
        )
        .bind(game.id)
        .bind(game.number_of_events)
        .bind(game.rating)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx(e, "Failed to update game aggregate"))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx(e, "Failed to commit event creation"))?;

        debug!(event_id = %created.id, %game_id, events = game.number_of_events, "Game aggregate updated");
        Ok((created, game))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Event>> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "Failed to find event"))
    }

    async fn update(&self, event: &Event) -> AppResult<bool> {
        // OR keeps the flag monotonic even against a stale writer.
        let result = sqlx::query(
            "UPDATE events SET organizer_id = $2, body = $3, game = $4, capacity = $5, \
             starts_at = $6, pre_notified = events.pre_notified OR $7 WHERE id = $1",
        )
        .bind(event.id)
        .bind(event.organizer_id)
        .bind(&event.body)
        .bind(&event.game)
        .bind(event.capacity)
        .bind(event.starts_at)
        .bind(event.pre_notified)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx(e, "Failed to update event"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_pre_notified(&self, id: Uuid) -> AppResult<Option<Event>> {
        sqlx::query_as::<_, Event>("UPDATE events SET pre_notified = TRUE WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "Failed to flag event as pre-notified"))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        // Memberships go with the row via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "Failed to delete event"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn fetch_window(
        &self,
        after: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<Event>> {
        sqlx::query_as::<_, Event>(
            "SELECT * FROM events \
             WHERE ($1::timestamptz IS NULL OR starts_at > $1) AND starts_at <= $2 \
             ORDER BY starts_at ASC, id ASC",
        )
        .bind(after)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx(e, "Failed to fetch event window"))
    }

    async fn add_member(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        joined_at: DateTime<Utc>,
    ) -> AppResult<Membership> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx(e, "Failed to begin transaction"))?;

        let capacity: Option<i32> =
            sqlx::query_scalar("SELECT capacity FROM events WHERE id = $1 FOR UPDATE")
                .bind(event_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx(e, "Failed to lock event"))?;

        let Some(capacity) = capacity else {
            return Err(AppError::not_found(format!("Event {event_id} not found")));
        };

        let members: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM event_members WHERE event_id = $1")
                .bind(event_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx(e, "Failed to count members"))?;

        if members >= i64::from(capacity) {
            debug!(%event_id, capacity, "Join rejected, event is full");
            return Err(AppError::conflict(format!("Event {event_id} is full")));
        }

        let membership = sqlx::query_as::<_, Membership>(
            "INSERT INTO event_members (event_id, user_id, joined_at) VALUES ($1, $2, $3) \
             ON CONFLICT (event_id, user_id) DO NOTHING RETURNING *",
        )
        .bind(event_id)
        .bind(user_id)
        .bind(joined_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx(e, "Failed to add member"))?
        .ok_or_else(|| {
            AppError::conflict(format!("User {user_id} already joined event {event_id}"))
        })?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx(e, "Failed to commit membership"))?;

        Ok(membership)
    }

    async fn remove_member(&self, event_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM event_members WHERE event_id = $1 AND user_id = $2")
            .bind(event_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "Failed to remove member"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn fetch_members(&self, event_id: Uuid) -> AppResult<Vec<Uuid>> {
        sqlx::query_scalar(
            "SELECT user_id FROM event_members WHERE event_id = $1 ORDER BY joined_at, user_id",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx(e, "Failed to fetch members"))
    }
}
