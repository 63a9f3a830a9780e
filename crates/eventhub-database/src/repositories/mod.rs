//! Repository traits and their implementations.
//!
//! Services depend on the traits only, so the PostgreSQL backend and the
//! in-process backend are interchangeable.

pub mod memory;
pub mod postgres;

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use eventhub_core::result::AppResult;
use eventhub_entity::event::{Event, Membership};
use eventhub_entity::game::Game;
use eventhub_entity::notification::Notification;
use eventhub_entity::user::User;

pub use postgres::{
    PgEventRepository, PgGameRepository, PgNotificationRepository, PgUserRepository,
};

/// Durable storage of events and their memberships.
#[async_trait]
pub trait EventRepository: Send + Sync + Debug + 'static {
    /// Insert the event and the organizer's membership in one transaction.
    ///
    /// `Conflict` when the id already exists, `NotFound` when the organizer
    /// is unknown.
    async fn insert(&self, event: &Event) -> AppResult<Event>;

    /// Create an event for a catalog game in one transaction.
    ///
    /// Checks that the organizer exists and owns `game_id`, stores the event
    /// under the game's catalog name with the organizer as first member, and
    /// counts the event in the game's aggregate. `NotFound` for an unknown
    /// organizer or game, `Validation` when the organizer does not own the
    /// game, `Conflict` on a duplicate id. Nothing is written on failure.
    async fn insert_for_game(&self, event: &Event, game_id: Uuid) -> AppResult<(Event, Game)>;

    /// Read one event.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Event>>;

    /// Overwrite the mutable fields of an existing event.
    ///
    /// `pre_notified` is never cleared by an update. Returns `false` when
    /// the row no longer exists.
    async fn update(&self, event: &Event) -> AppResult<bool>;

    /// Set `pre_notified` and nothing else, returning the stored row.
    ///
    /// `None` when the row no longer exists.
    async fn mark_pre_notified(&self, id: Uuid) -> AppResult<Option<Event>>;

    /// Remove the event together with all of its memberships.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    /// Events with `after < starts_at <= until`, ascending by start.
    /// `after = None` leaves the lower end open.
    async fn fetch_window(
        &self,
        after: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<Event>>;

    /// Add a member under a row lock on the event.
    ///
    /// `NotFound` when the event or user is missing, `Conflict` when the
    /// event is full or the user already joined.
    async fn add_member(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        joined_at: DateTime<Utc>,
    ) -> AppResult<Membership>;

    /// Remove a membership. Returns `false` if there was none.
    async fn remove_member(&self, event_id: Uuid, user_id: Uuid) -> AppResult<bool>;

    /// Member ids of an event in join order. Empty when the event is gone.
    async fn fetch_members(&self, event_id: Uuid) -> AppResult<Vec<Uuid>>;
}

/// Durable storage of per-recipient notifications.
#[async_trait]
pub trait NotificationRepository: Send + Sync + Debug + 'static {
    /// Create one notification per current member of `event_id`.
    ///
    /// The member set is read by the same statement that writes the rows,
    /// so the recipients are a point-in-time snapshot.
    async fn create_for_members(
        &self,
        event_id: Uuid,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>>;

    /// A user's notifications, newest first.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Notification>>;

    /// Total number of notifications a user holds.
    async fn count_for_user(&self, user_id: Uuid) -> AppResult<i64>;

    /// Delete one notification owned by `user_id`.
    async fn delete_for_user(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<bool>;

    /// Delete every notification owned by `user_id`.
    async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<u64>;
}

/// Read access to the user directory plus chat id bookkeeping.
#[async_trait]
pub trait UserRepository: Send + Sync + Debug + 'static {
    /// Look up a user by id.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Look up a user by Telegram handle, case-insensitively.
    async fn find_by_telegram_username(&self, handle: &str) -> AppResult<Option<User>>;

    /// Record or clear the Telegram chat id. Returns `false` for unknown users.
    async fn set_chat_id(&self, user_id: Uuid, chat_id: Option<i64>) -> AppResult<bool>;

    /// Chat ids of the given users that have one.
    async fn find_chat_ids(&self, user_ids: &[Uuid]) -> AppResult<Vec<(Uuid, i64)>>;
}

/// Read access to the game catalog.
#[async_trait]
pub trait GameRepository: Send + Sync + Debug + 'static {
    /// Look up a game with its current aggregates.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Game>>;
}
