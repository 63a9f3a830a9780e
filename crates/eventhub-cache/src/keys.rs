//! Cache key builders for all EventHub cache entries.

use uuid::Uuid;

/// Prefix applied to all EventHub cache keys.
const PREFIX: &str = "eventhub";

/// Cache key for an event snapshot by ID.
pub fn event_by_id(event_id: Uuid) -> String {
    format!("{PREFIX}:event:{event_id}")
}
