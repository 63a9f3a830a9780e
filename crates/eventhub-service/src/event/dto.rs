//! Request payloads for event use cases.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Create event request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateEventRequest {
    /// The creating user; becomes the first member.
    pub organizer_id: Uuid,
    /// Description shown to participants.
    #[validate(length(min = 1, max = 2000, message = "Body must be 1-2000 characters"))]
    pub body: String,
    /// Catalog game the event is for; the organizer must own it.
    pub game_id: Uuid,
    /// Maximum number of members, organizer included.
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    pub capacity: i32,
    /// Minutes from now until the event starts.
    #[validate(range(min = 1, max = 525600, message = "Start must be 1 minute to 1 year ahead"))]
    pub starts_in_minutes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CreateEventRequest {
        CreateEventRequest {
            organizer_id: Uuid::new_v4(),
            body: "5v5 scrim".to_string(),
            game_id: Uuid::new_v4(),
            capacity: 10,
            starts_in_minutes: 45,
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_body_and_zero_capacity() {
        let req = CreateEventRequest {
            body: String::new(),
            capacity: 0,
            ..valid()
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("body"));
        assert!(fields.contains_key("capacity"));
    }

    #[test]
    fn test_rejects_past_start() {
        let req = CreateEventRequest {
            starts_in_minutes: 0,
            ..valid()
        };
        assert!(req.validate().is_err());
    }
}
