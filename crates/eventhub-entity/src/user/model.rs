//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The slice of a user account that event scheduling and delivery need.
///
/// Accounts are owned by the account system; this crate only reads them
/// and records the Telegram chat id when a user opts in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Login name.
    pub username: String,
    /// Telegram handle (without `@`) used to match bot conversations.
    pub telegram_username: Option<String>,
    /// Telegram chat id, present once the user opted in to notifications.
    pub chat_id: Option<i64>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether the bot can reach this user.
    pub fn is_subscribed(&self) -> bool {
        self.chat_id.is_some()
    }
}
