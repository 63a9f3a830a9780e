//! Event membership rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user's participation in an event. The set of memberships of an event
/// is exactly its notification recipient set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Membership {
    /// The event joined.
    pub event_id: Uuid,
    /// The participating user.
    pub user_id: Uuid,
    /// When the user joined.
    pub joined_at: DateTime<Utc>,
}
