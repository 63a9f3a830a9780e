//! Notification bodies for lifecycle transitions.

use eventhub_entity::event::Event;

/// Body sent when an event enters its pre-notification window.
pub fn approaching(event: &Event, minutes: i64) -> String {
    format!("Event \"{}\" starts in {} minutes!", event.body, minutes)
}

/// Body sent when an event has started.
pub fn started(event: &Event) -> String {
    format!("Event \"{}\" has started!", event.body)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_bodies() {
        let event = Event::new(Uuid::new_v4(), "Friday scrims", "cs2", 10, Utc::now(), Utc::now());
        assert_eq!(
            approaching(&event, 10),
            "Event \"Friday scrims\" starts in 10 minutes!"
        );
        assert_eq!(started(&event), "Event \"Friday scrims\" has started!");
    }
}
