//! Event entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::phase::LifecyclePhase;

/// A scheduled, time-bound gathering that users can join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// The user who created the event. Always a member.
    pub organizer_id: Uuid,
    /// Free-form description shown in notifications.
    pub body: String,
    /// Name of the game played at the event.
    pub game: String,
    /// Maximum number of members, organizer included.
    pub capacity: i32,
    /// Scheduled start instant.
    pub starts_at: DateTime<Utc>,
    /// Whether the "starting soon" notification has been sent.
    /// Only ever moves from `false` to `true`.
    pub pre_notified: bool,
    /// When the event was created.
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Build a fresh, not yet notified event.
    pub fn new(
        organizer_id: Uuid,
        body: impl Into<String>,
        game: impl Into<String>,
        capacity: i32,
        starts_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organizer_id,
            body: body.into(),
            game: game.into(),
            capacity,
            starts_at,
            pre_notified: false,
            created_at,
        }
    }

    /// Classify the event relative to an effective tick time.
    pub fn phase(&self, effective_now: DateTime<Utc>, pre_window: chrono::Duration) -> LifecyclePhase {
        LifecyclePhase::classify(self.starts_at, self.pre_notified, effective_now, pre_window)
    }

    /// Time left until the start, or `None` once the start has been reached.
    ///
    /// Used as the cache TTL so that entries never outlive the event.
    pub fn remaining_until_start(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        (self.starts_at - now).to_std().ok().filter(|d| !d.is_zero())
    }

    /// Whole minutes left until the start, rounded to the nearest minute.
    pub fn minutes_until_start(&self, now: DateTime<Utc>) -> i64 {
        let secs = (self.starts_at - now).num_seconds().max(0);
        (secs + 30) / 60
    }
}

/// An event together with its member ids, read at one point in time.
///
/// This is what a delivery channel receives for a lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    /// The event being notified about.
    pub event: Event,
    /// Recipients.
    pub members: Vec<Uuid>,
}
