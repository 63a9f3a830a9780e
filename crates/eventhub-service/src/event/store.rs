//! Cache-aside event store.
//!
//! The durable repository is the only source of truth. The cache holds JSON
//! snapshots keyed by event id with a TTL equal to the time left until the
//! event starts; it is consulted only by [`EventStore::find_by_id`], and every
//! cache failure degrades to a durable read or a logged warning.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use eventhub_cache::CacheManager;
use eventhub_cache::keys;
use eventhub_core::error::AppError;
use eventhub_core::result::AppResult;
use eventhub_core::traits::cache::CacheProvider;
use eventhub_core::traits::clock::Clock;
use eventhub_database::repositories::EventRepository;
use eventhub_entity::event::{Event, Membership};
use eventhub_entity::game::Game;

/// Events and memberships, durable first, cache second.
#[derive(Debug, Clone)]
pub struct EventStore {
    events: Arc<dyn EventRepository>,
    cache: Arc<CacheManager>,
    clock: Arc<dyn Clock>,
}

impl EventStore {
    /// Creates a new event store.
    pub fn new(
        events: Arc<dyn EventRepository>,
        cache: Arc<CacheManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            events,
            cache,
            clock,
        }
    }

    /// Persist a new event and its organizer membership, then seed the cache.
    pub async fn create(&self, event: &Event) -> AppResult<Event> {
        let created = self.events.insert(event).await?;
        info!(
            event_id = %created.id,
            organizer_id = %created.organizer_id,
            starts_at = %created.starts_at,
            "Event created"
        );
        self.refresh_cache(&created).await;
        Ok(created)
    }

    /// Persist a new event for a catalog game, counting it in the game's
    /// aggregate in the same durable transaction, then seed the cache.
    pub async fn create_for_game(&self, event: &Event, game_id: Uuid) -> AppResult<(Event, Game)> {
        let (created, game) = self.events.insert_for_game(event, game_id).await?;
        info!(
            event_id = %created.id,
            organizer_id = %created.organizer_id,
            game = %game.name,
            starts_at = %created.starts_at,
            "Event created"
        );
        self.refresh_cache(&created).await;
        Ok((created, game))
    }

    /// Read an event, serving from cache when possible.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Event> {
        let key = keys::event_by_id(id);

        match self.cache.get(&key).await {
            Ok(Some(cached)) => match serde_json::from_str::<Event>(&cached) {
                Ok(event) => {
                    debug!(event_id = %id, "Event cache hit");
                    return Ok(event);
                }
                Err(e) => {
                    warn!(event_id = %id, error = %e, "Discarding undecodable cache entry");
                    if let Err(e) = self.cache.delete(&key).await {
                        warn!(event_id = %id, error = %e, "Failed to evict cache entry");
                    }
                }
            },
            Ok(None) => {}
            Err(e) => {
                warn!(event_id = %id, error = %e, "Event cache read failed, using durable store");
            }
        }

        let event = self
            .events
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Event {id} not found")))?;

        self.refresh_cache(&event).await;
        Ok(event)
    }

    /// Persist changes to an existing event and refresh its cache entry.
    ///
    /// The cache TTL is recomputed from the saved start time, so a moved
    /// event never keeps a TTL derived from its old start.
    pub async fn save(&self, event: &Event) -> AppResult<()> {
        if !self.events.update(event).await? {
            return Err(AppError::not_found(format!("Event {} not found", event.id)));
        }
        debug!(event_id = %event.id, pre_notified = event.pre_notified, "Event saved");
        self.refresh_cache(event).await;
        Ok(())
    }

    /// Flag an event as pre-notified without touching its other fields.
    ///
    /// The cache is refreshed from the row the durable store returns, so a
    /// reschedule committed after the caller read the event is kept.
    pub async fn mark_pre_notified(&self, id: Uuid) -> AppResult<Event> {
        let flagged = self
            .events
            .mark_pre_notified(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Event {id} not found")))?;
        debug!(event_id = %id, "Event flagged as pre-notified");
        self.refresh_cache(&flagged).await;
        Ok(flagged)
    }

    /// Remove an event and all of its memberships.
    ///
    /// Returns `false` when the event was already gone.
    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let removed = self.events.delete(id).await?;
        if let Err(e) = self.cache.delete(&keys::event_by_id(id)).await {
            warn!(event_id = %id, error = %e, "Failed to evict deleted event from cache");
        }
        if removed {
            info!(event_id = %id, "Event deleted");
        }
        Ok(removed)
    }

    /// Events with `after < starts_at <= until`, ascending. Always durable.
    pub async fn fetch_window(
        &self,
        after: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<Event>> {
        self.events.fetch_window(after, until).await
    }

    /// Current member ids of an event.
    pub async fn fetch_members(&self, event_id: Uuid) -> AppResult<Vec<Uuid>> {
        self.events.fetch_members(event_id).await
    }

    /// Add a member, enforcing capacity and uniqueness.
    pub async fn join(&self, event_id: Uuid, user_id: Uuid) -> AppResult<Membership> {
        let membership = self
            .events
            .add_member(event_id, user_id, self.clock.now())
            .await?;
        info!(%event_id, %user_id, "User joined event");
        Ok(membership)
    }

    /// Remove a member.
    pub async fn unjoin(&self, event_id: Uuid, user_id: Uuid) -> AppResult<()> {
        if !self.events.remove_member(event_id, user_id).await? {
            return Err(AppError::not_found(format!(
                "User {user_id} is not a member of event {event_id}"
            )));
        }
        info!(%event_id, %user_id, "User left event");
        Ok(())
    }

    async fn refresh_cache(&self, event: &Event) {
        let key = keys::event_by_id(event.id);
        let result = match event.remaining_until_start(self.clock.now()) {
            Some(ttl) => self.cache.set_json(&key, event, ttl).await,
            None => self.cache.delete(&key).await,
        };
        if let Err(e) = result {
            warn!(event_id = %event.id, error = %e, "Failed to refresh event cache entry");
        }
    }
}
