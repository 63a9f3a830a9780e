//! Game catalog entry.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A game from the catalog, with the aggregates kept up to date as players
/// pick it up and events are created for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Game {
    /// Unique game identifier.
    pub id: Uuid,
    /// Display name, copied onto events created for the game.
    pub name: String,
    /// Users who list the game as owned.
    pub number_of_players: i32,
    /// Events ever created for the game.
    pub number_of_events: i32,
    /// Popularity score derived from the two counters.
    pub rating: f64,
}

impl Game {
    /// Recompute `rating` from the counters. A game nobody owns rates zero.
    pub fn calculate_rating(&mut self) {
        self.rating = if self.number_of_players == 0 {
            0.0
        } else {
            f64::from(self.number_of_players + self.number_of_events) / 2.0
        };
    }

    /// Count one more event and refresh the rating.
    pub fn record_event(&mut self) {
        self.number_of_events += 1;
        self.calculate_rating();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(players: i32, events: i32) -> Game {
        Game {
            id: Uuid::new_v4(),
            name: "dota2".to_string(),
            number_of_players: players,
            number_of_events: events,
            rating: 0.0,
        }
    }

    #[test]
    fn test_rating_averages_counters() {
        let mut g = game(3, 4);
        g.calculate_rating();
        assert_eq!(g.rating, 3.5);
    }

    #[test]
    fn test_rating_is_zero_without_players() {
        let mut g = game(0, 6);
        g.record_event();
        assert_eq!(g.number_of_events, 7);
        assert_eq!(g.rating, 0.0);
    }

    #[test]
    fn test_record_event() {
        let mut g = game(2, 1);
        g.record_event();
        assert_eq!(g.number_of_events, 2);
        assert_eq!(g.rating, 2.0);
    }
}
