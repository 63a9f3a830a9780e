//! In-process implementation of every repository trait.
//!
//! All tables live behind one async mutex, so each trait method is atomic
//! with respect to every other one, mirroring the transactional guarantees
//! of the PostgreSQL backend. Nothing survives a restart.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use eventhub_core::error::AppError;
use eventhub_core::result::AppResult;
use eventhub_entity::event::{Event, Membership};
use eventhub_entity::game::Game;
use eventhub_entity::notification::Notification;
use eventhub_entity::user::User;

use super::{EventRepository, GameRepository, NotificationRepository, UserRepository};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    members: Vec<Membership>,
    games: HashMap<Uuid, Game>,
    /// `(user_id, game_id)` ownership pairs.
    owned_games: HashSet<(Uuid, Uuid)>,
    notifications: Vec<Notification>,
}

/// Shared in-memory store. Cloning yields another handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryDatabase {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a user account.
    pub async fn upsert_user(&self, user: User) {
        self.tables.lock().await.users.insert(user.id, user);
    }

    /// Seed or replace a catalog game.
    pub async fn upsert_game(&self, game: Game) {
        self.tables.lock().await.games.insert(game.id, game);
    }

    /// Record that a user owns a game.
    pub async fn grant_game(&self, user_id: Uuid, game_id: Uuid) {
        self.tables.lock().await.owned_games.insert((user_id, game_id));
    }

    /// Number of stored events.
    pub async fn event_count(&self) -> usize {
        self.tables.lock().await.events.len()
    }
}

impl Tables {
    fn insert_with_organizer(&mut self, event: &Event) -> AppResult<Event> {
        if self.events.contains_key(&event.id) {
            return Err(AppError::conflict(format!("Event {} already exists", event.id)));
        }
        if !self.users.contains_key(&event.organizer_id) {
            return Err(AppError::not_found(format!(
                "Organizer {} not found",
                event.organizer_id
            )));
        }
        self.events.insert(event.id, event.clone());
        self.members.push(Membership {
            event_id: event.id,
            user_id: event.organizer_id,
            joined_at: event.created_at,
        });
        Ok(event.clone())
    }
}

#[async_trait]
impl EventRepository for MemoryDatabase {
    async fn insert(&self, event: &Event) -> AppResult<Event> {
        self.tables.lock().await.insert_with_organizer(event)
    }

    async fn insert_for_game(&self, event: &Event, game_id: Uuid) -> AppResult<(Event, Game)> {
        let mut tables = self.tables.lock().await;
        let organizer_id = event.organizer_id;
        if !tables.users.contains_key(&organizer_id) {
            return Err(AppError::not_found(format!("Organizer {organizer_id} not found")));
        }
        let Some(mut game) = tables.games.get(&game_id).cloned() else {
            return Err(AppError::not_found(format!("Game {game_id} not found")));
        };
        if !tables.owned_games.contains(&(organizer_id, game_id)) {
            return Err(AppError::validation(format!(
                "User {organizer_id} does not own game {}",
                game.name
            )));
        }

        let created = tables.insert_with_organizer(&Event {
            game: game.name.clone(),
            ..event.clone()
        })?;
        game.record_event();
        tables.games.insert(game_id, game.clone());
        Ok((created, game))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Event>> {
        Ok(self.tables.lock().await.events.get(&id).cloned())
    }

    async fn update(&self, event: &Event) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        let Some(stored) = tables.events.get_mut(&event.id) else {
            return Ok(false);
        };
        let pre_notified = stored.pre_notified || event.pre_notified;
        *stored = Event {
            pre_notified,
            created_at: stored.created_at,
            ..event.clone()
        };
        Ok(true)
    }

    async fn mark_pre_notified(&self, id: Uuid) -> AppResult<Option<Event>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.events.get_mut(&id).map(|stored| {
            stored.pre_notified = true;
            stored.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        let removed = tables.events.remove(&id).is_some();
        tables.members.retain(|m| m.event_id != id);
        Ok(removed)
    }

    async fn fetch_window(
        &self,
        after: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<Event>> {
        let tables = self.tables.lock().await;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|e| after.is_none_or(|lower| e.starts_at > lower) && e.starts_at <= until)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn add_member(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        joined_at: DateTime<Utc>,
    ) -> AppResult<Membership> {
        let mut tables = self.tables.lock().await;
        let Some(capacity) = tables.events.get(&event_id).map(|e| e.capacity) else {
            return Err(AppError::not_found(format!("Event {event_id} not found")));
        };
        if !tables.users.contains_key(&user_id) {
            return Err(AppError::not_found(format!("User {user_id} not found")));
        }

        let current: Vec<&Membership> = tables
            .members
            .iter()
            .filter(|m| m.event_id == event_id)
            .collect();
        if current.len() as i64 >= i64::from(capacity) {
            return Err(AppError::conflict(format!("Event {event_id} is full")));
        }
        if current.iter().any(|m| m.user_id == user_id) {
            return Err(AppError::conflict(format!(
                "User {user_id} already joined event {event_id}"
            )));
        }

        let membership = Membership {
            event_id,
            user_id,
            joined_at,
        };
        tables.members.push(membership.clone());
        Ok(membership)
    }

    async fn remove_member(&self, event_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.members.len();
        tables
            .members
            .retain(|m| !(m.event_id == event_id && m.user_id == user_id));
        Ok(tables.members.len() < before)
    }

    async fn fetch_members(&self, event_id: Uuid) -> AppResult<Vec<Uuid>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .members
            .iter()
            .filter(|m| m.event_id == event_id)
            .map(|m| m.user_id)
            .collect())
    }
}

#[async_trait]
impl NotificationRepository for MemoryDatabase {
    async fn create_for_members(
        &self,
        event_id: Uuid,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>> {
        let mut tables = self.tables.lock().await;
        let created: Vec<Notification> = tables
            .members
            .iter()
            .filter(|m| m.event_id == event_id)
            .map(|m| Notification {
                id: Uuid::new_v4(),
                recipient_id: m.user_id,
                event_id,
                body: body.to_string(),
                created_at,
            })
            .collect();
        tables.notifications.extend(created.iter().cloned());
        Ok(created)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Notification>> {
        let tables = self.tables.lock().await;
        let mut owned: Vec<Notification> = tables
            .notifications
            .iter()
            .filter(|n| n.recipient_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(owned
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_for_user(&self, user_id: Uuid) -> AppResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .notifications
            .iter()
            .filter(|n| n.recipient_id == user_id)
            .count() as i64)
    }

    async fn delete_for_user(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.notifications.len();
        tables
            .notifications
            .retain(|n| !(n.id == notification_id && n.recipient_id == user_id));
        Ok(tables.notifications.len() < before)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.notifications.len();
        tables.notifications.retain(|n| n.recipient_id != user_id);
        Ok((before - tables.notifications.len()) as u64)
    }
}

#[async_trait]
impl GameRepository for MemoryDatabase {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Game>> {
        Ok(self.tables.lock().await.games.get(&id).cloned())
    }
}

#[async_trait]
impl UserRepository for MemoryDatabase {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_by_telegram_username(&self, handle: &str) -> AppResult<Option<User>> {
        let handle = handle.trim_start_matches('@');
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| {
                u.telegram_username
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(handle))
            })
            .cloned())
    }

    async fn set_chat_id(&self, user_id: Uuid, chat_id: Option<i64>) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.users.get_mut(&user_id) {
            Some(user) => {
                user.chat_id = chat_id;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_chat_ids(&self, user_ids: &[Uuid]) -> AppResult<Vec<(Uuid, i64)>> {
        let tables = self.tables.lock().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| {
                tables
                    .users
                    .get(id)
                    .and_then(|u| u.chat_id.map(|chat| (u.id, chat)))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use eventhub_core::error::ErrorKind;

    fn user(name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: name.to_string(),
            telegram_username: Some(format!("{name}_tg")),
            chat_id: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 20, minute, 0).unwrap()
    }

    async fn seeded() -> (MemoryDatabase, User) {
        let db = MemoryDatabase::new();
        let organizer = user("alice");
        db.upsert_user(organizer.clone()).await;
        (db, organizer)
    }

    #[tokio::test]
    async fn test_insert_adds_organizer_membership() {
        let (db, organizer) = seeded().await;
        let event = Event::new(organizer.id, "ranked", "cs2", 5, at(30), at(0));
        db.insert(&event).await.unwrap();

        assert_eq!(db.fetch_members(event.id).await.unwrap(), vec![organizer.id]);
        let dup = db.insert(&event).await.unwrap_err();
        assert_eq!(dup.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_insert_unknown_organizer() {
        let db = MemoryDatabase::new();
        let event = Event::new(Uuid::new_v4(), "ranked", "cs2", 5, at(30), at(0));
        let err = db.insert(&event).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(db.event_count().await, 0);
    }

    fn game(name: &str, players: i32) -> Game {
        Game {
            id: Uuid::new_v4(),
            name: name.to_string(),
            number_of_players: players,
            number_of_events: 0,
            rating: 0.0,
        }
    }

    #[tokio::test]
    async fn test_insert_for_game_updates_aggregate() {
        let (db, organizer) = seeded().await;
        let cs2 = game("Counter-Strike 2", 3);
        db.upsert_game(cs2.clone()).await;
        db.grant_game(organizer.id, cs2.id).await;

        let draft = Event::new(organizer.id, "ranked", "", 5, at(30), at(0));
        let (created, updated) = db.insert_for_game(&draft, cs2.id).await.unwrap();
        assert_eq!(created.game, "Counter-Strike 2");
        assert_eq!(updated.number_of_events, 1);
        assert_eq!(updated.rating, 2.0);
        assert_eq!(db.fetch_members(created.id).await.unwrap(), vec![organizer.id]);

        let stored = GameRepository::find_by_id(&db, cs2.id).await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_insert_for_game_writes_nothing_on_failure() {
        let (db, organizer) = seeded().await;
        let chess = game("chess", 1);
        db.upsert_game(chess.clone()).await;

        let draft = Event::new(organizer.id, "blitz", "", 2, at(30), at(0));
        let err = db.insert_for_game(&draft, chess.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let err = db.insert_for_game(&draft, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        // A duplicate id fails after the checks; the aggregate must not move.
        db.grant_game(organizer.id, chess.id).await;
        db.insert_for_game(&draft, chess.id).await.unwrap();
        let err = db.insert_for_game(&draft, chess.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        assert_eq!(db.event_count().await, 1);
        let stored = GameRepository::find_by_id(&db, chess.id).await.unwrap().unwrap();
        assert_eq!(stored.number_of_events, 1);
    }

    #[tokio::test]
    async fn test_fetch_window_bounds_and_order() {
        let (db, organizer) = seeded().await;
        let late = Event::new(organizer.id, "late", "g", 2, at(40), at(0));
        let early = Event::new(organizer.id, "early", "g", 2, at(10), at(0));
        let edge = Event::new(organizer.id, "edge", "g", 2, at(20), at(0));
        for e in [&late, &early, &edge] {
            db.insert(e).await.unwrap();
        }

        let window = db.fetch_window(Some(at(10)), at(40)).await.unwrap();
        let bodies: Vec<&str> = window.iter().map(|e| e.body.as_str()).collect();
        assert_eq!(bodies, vec!["edge", "late"]);

        let open = db.fetch_window(None, at(20)).await.unwrap();
        let bodies: Vec<&str> = open.iter().map(|e| e.body.as_str()).collect();
        assert_eq!(bodies, vec!["early", "edge"]);

        assert!(db.fetch_window(Some(at(40)), at(50)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_never_clears_pre_notified() {
        let (db, organizer) = seeded().await;
        let mut event = Event::new(organizer.id, "ranked", "cs2", 5, at(30), at(0));
        db.insert(&event).await.unwrap();

        event.pre_notified = true;
        assert!(db.update(&event).await.unwrap());
        event.pre_notified = false;
        assert!(db.update(&event).await.unwrap());

        let stored = EventRepository::find_by_id(&db, event.id).await.unwrap().unwrap();
        assert!(stored.pre_notified);
    }

    #[tokio::test]
    async fn test_mark_pre_notified_keeps_other_fields() {
        let (db, organizer) = seeded().await;
        let mut event = Event::new(organizer.id, "ranked", "cs2", 5, at(30), at(0));
        db.insert(&event).await.unwrap();

        event.starts_at = at(45);
        assert!(db.update(&event).await.unwrap());

        let flagged = db.mark_pre_notified(event.id).await.unwrap().unwrap();
        assert!(flagged.pre_notified);
        assert_eq!(flagged.starts_at, at(45));
        assert!(db.mark_pre_notified(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let (db, organizer) = seeded().await;
        let event = Event::new(organizer.id, "ranked", "cs2", 5, at(30), at(0));
        assert!(!db.update(&event).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_member_capacity_and_duplicates() {
        let (db, organizer) = seeded().await;
        let bob = user("bob");
        let carol = user("carol");
        db.upsert_user(bob.clone()).await;
        db.upsert_user(carol.clone()).await;

        let event = Event::new(organizer.id, "duo", "cs2", 2, at(30), at(0));
        db.insert(&event).await.unwrap();

        db.add_member(event.id, bob.id, at(1)).await.unwrap();
        let full = db.add_member(event.id, carol.id, at(2)).await.unwrap_err();
        assert_eq!(full.kind, ErrorKind::Conflict);

        assert!(db.remove_member(event.id, bob.id).await.unwrap());
        db.add_member(event.id, carol.id, at(3)).await.unwrap();
        let dup = db.add_member(event.id, carol.id, at(4)).await.unwrap_err();
        assert_eq!(dup.kind, ErrorKind::Conflict);

        let missing = db
            .add_member(Uuid::new_v4(), carol.id, at(5))
            .await
            .unwrap_err();
        assert_eq!(missing.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_removes_memberships() {
        let (db, organizer) = seeded().await;
        let event = Event::new(organizer.id, "ranked", "cs2", 5, at(30), at(0));
        db.insert(&event).await.unwrap();

        assert!(db.delete(event.id).await.unwrap());
        assert!(db.fetch_members(event.id).await.unwrap().is_empty());
        assert!(!db.delete(event.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_notifications_snapshot_members() {
        let (db, organizer) = seeded().await;
        let bob = user("bob");
        db.upsert_user(bob.clone()).await;
        let event = Event::new(organizer.id, "ranked", "cs2", 5, at(30), at(0));
        db.insert(&event).await.unwrap();
        db.add_member(event.id, bob.id, at(1)).await.unwrap();

        let created = db
            .create_for_members(event.id, "starts soon", at(20))
            .await
            .unwrap();
        assert_eq!(created.len(), 2);

        db.remove_member(event.id, bob.id).await.unwrap();
        assert_eq!(db.count_for_user(bob.id).await.unwrap(), 1);

        let listed = db.list_for_user(bob.id, 10, 0).await.unwrap();
        assert_eq!(listed[0].body, "starts soon");
        assert!(db.delete_for_user(bob.id, listed[0].id).await.unwrap());
        assert!(!db.delete_for_user(bob.id, listed[0].id).await.unwrap());
        assert_eq!(db.delete_all_for_user(organizer.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_chat_ids() {
        let (db, organizer) = seeded().await;
        let found = db.find_by_telegram_username("@ALICE_tg").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(organizer.id));

        assert!(db.set_chat_id(organizer.id, Some(42)).await.unwrap());
        let ids = db.find_chat_ids(&[organizer.id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(ids, vec![(organizer.id, 42)]);

        assert!(!db.set_chat_id(Uuid::new_v4(), Some(1)).await.unwrap());
    }
}
