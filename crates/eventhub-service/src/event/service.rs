//! Request-facing event operations.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;
use validator::Validate;

use eventhub_core::error::AppError;
use eventhub_core::result::AppResult;
use eventhub_core::traits::clock::Clock;
use eventhub_database::repositories::GameRepository;
use eventhub_entity::event::{Event, Membership};
use eventhub_entity::game::Game;

use super::dto::CreateEventRequest;
use super::store::EventStore;

/// Event use cases invoked by request handlers, concurrently with the
/// lifecycle scheduler.
#[derive(Debug, Clone)]
pub struct EventService {
    store: Arc<EventStore>,
    games: Arc<dyn GameRepository>,
    clock: Arc<dyn Clock>,
}

impl EventService {
    /// Creates a new event service.
    pub fn new(store: Arc<EventStore>, games: Arc<dyn GameRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            games,
            clock,
        }
    }

    /// Validates the request and creates a not yet notified event.
    ///
    /// The organizer and game checks, the event insert and the game
    /// aggregate update commit together or not at all.
    pub async fn create_event(&self, req: CreateEventRequest) -> AppResult<Event> {
        req.validate()
            .map_err(|e| AppError::validation(format!("Invalid event: {e}")))?;

        let now = self.clock.now();
        // The game name is taken from the catalog inside the transaction.
        let draft = Event::new(
            req.organizer_id,
            req.body,
            String::new(),
            req.capacity,
            now + chrono::Duration::minutes(req.starts_in_minutes),
            now,
        );

        let (event, game) = self.store.create_for_game(&draft, req.game_id).await?;
        info!(
            event_id = %event.id,
            game_id = %game.id,
            number_of_events = game.number_of_events,
            rating = game.rating,
            "Game aggregate updated"
        );
        Ok(event)
    }

    /// Fetches one event.
    pub async fn get_event(&self, event_id: Uuid) -> AppResult<Event> {
        self.store.find_by_id(event_id).await
    }

    /// Fetches a catalog game with its aggregates.
    pub async fn get_game(&self, game_id: Uuid) -> AppResult<Game> {
        self.games
            .find_by_id(game_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Game {game_id} not found")))
    }

    /// Lists the member ids of an event.
    pub async fn list_members(&self, event_id: Uuid) -> AppResult<Vec<Uuid>> {
        self.store.find_by_id(event_id).await?;
        self.store.fetch_members(event_id).await
    }

    /// Deletes an event before it starts.
    pub async fn delete_event(&self, event_id: Uuid) -> AppResult<()> {
        if !self.store.delete(event_id).await? {
            return Err(AppError::not_found(format!("Event {event_id} not found")));
        }
        Ok(())
    }

    /// Adds a user to an event.
    pub async fn join_event(&self, event_id: Uuid, user_id: Uuid) -> AppResult<Membership> {
        let membership = self.store.join(event_id, user_id).await?;
        info!(%event_id, %user_id, "Join accepted");
        Ok(membership)
    }

    /// Removes a user from an event.
    pub async fn unjoin_event(&self, event_id: Uuid, user_id: Uuid) -> AppResult<()> {
        self.store.unjoin(event_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use eventhub_cache::CacheManager;
    use eventhub_core::config::cache::CacheConfig;
    use eventhub_core::error::ErrorKind;
    use eventhub_core::traits::clock::ManualClock;
    use eventhub_database::MemoryDatabase;
    use eventhub_entity::user::User;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 2, 21, 0, 0).unwrap()
    }

    fn user(name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: name.to_string(),
            telegram_username: None,
            chat_id: None,
            created_at: t0(),
        }
    }

    struct Fixture {
        service: EventService,
        db: MemoryDatabase,
        game: Game,
    }

    async fn fixture() -> Fixture {
        let db = MemoryDatabase::new();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));
        let cache = Arc::new(CacheManager::new(&CacheConfig::default()).await.unwrap());
        let store = Arc::new(EventStore::new(
            Arc::new(db.clone()),
            cache,
            Arc::clone(&clock),
        ));
        let game = Game {
            id: Uuid::new_v4(),
            name: "World of Warcraft".to_string(),
            number_of_players: 1,
            number_of_events: 0,
            rating: 0.5,
        };
        db.upsert_game(game.clone()).await;
        Fixture {
            service: EventService::new(store, Arc::new(db.clone()), clock),
            db,
            game,
        }
    }

    /// A user who owns the fixture game.
    async fn organizer(f: &Fixture) -> User {
        let organizer = user("org");
        f.db.upsert_user(organizer.clone()).await;
        f.db.grant_game(organizer.id, f.game.id).await;
        organizer
    }

    fn request(f: &Fixture, organizer_id: Uuid, capacity: i32) -> CreateEventRequest {
        CreateEventRequest {
            organizer_id,
            body: "weekly raid".to_string(),
            game_id: f.game.id,
            capacity,
            starts_in_minutes: 20,
        }
    }

    #[tokio::test]
    async fn test_create_event_sets_start_and_flag() {
        let f = fixture().await;
        let organizer = organizer(&f).await;

        let event = f.service.create_event(request(&f, organizer.id, 4)).await.unwrap();
        assert_eq!(event.starts_at, t0() + chrono::Duration::minutes(20));
        assert_eq!(event.game, "World of Warcraft");
        assert!(!event.pre_notified);
        assert_eq!(f.service.get_event(event.id).await.unwrap(), event);
        assert_eq!(f.service.list_members(event.id).await.unwrap(), vec![organizer.id]);
    }

    #[tokio::test]
    async fn test_create_event_counts_towards_game() {
        let f = fixture().await;
        let organizer = organizer(&f).await;

        for _ in 0..2 {
            f.service.create_event(request(&f, organizer.id, 4)).await.unwrap();
        }
        let game = f.service.get_game(f.game.id).await.unwrap();
        assert_eq!(game.number_of_events, 2);
        assert_eq!(game.rating, 1.5);

        let err = f.service.get_game(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_create_event_requires_owned_game() {
        let f = fixture().await;
        let outsider = user("outsider");
        f.db.upsert_user(outsider.clone()).await;

        let err = f
            .service
            .create_event(request(&f, outsider.id, 3))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(f.db.event_count().await, 0);
        assert_eq!(f.service.get_game(f.game.id).await.unwrap().number_of_events, 0);
    }

    #[tokio::test]
    async fn test_create_event_validation_and_unknown_organizer() {
        let f = fixture().await;
        let err = f
            .service
            .create_event(request(&f, Uuid::new_v4(), 0))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let err = f
            .service
            .create_event(request(&f, Uuid::new_v4(), 3))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_capacity_is_enforced() {
        let f = fixture().await;
        let organizer = organizer(&f).await;
        let guest = user("guest");
        let late = user("late");
        for u in [&guest, &late] {
            f.db.upsert_user(u.clone()).await;
        }

        let event = f.service.create_event(request(&f, organizer.id, 2)).await.unwrap();
        f.service.join_event(event.id, guest.id).await.unwrap();
        let err = f.service.join_event(event.id, late.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        f.service.unjoin_event(event.id, guest.id).await.unwrap();
        f.service.join_event(event.id, late.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_event_twice() {
        let f = fixture().await;
        let organizer = organizer(&f).await;
        let event = f.service.create_event(request(&f, organizer.id, 2)).await.unwrap();

        f.service.delete_event(event.id).await.unwrap();
        let err = f.service.delete_event(event.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        let err = f.service.join_event(event.id, organizer.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
