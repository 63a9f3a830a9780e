//! Notification entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A durable record that one user was told something about one event.
///
/// Notifications are never mutated. `event_id` is informational and may
/// point at an event that has since been deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: Uuid,
    /// The recipient user.
    pub recipient_id: Uuid,
    /// The event the notification is about.
    pub event_id: Uuid,
    /// Rendered message text.
    pub body: String,
    /// When the notification was created.
    pub created_at: DateTime<Utc>,
}
