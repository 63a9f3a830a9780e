//! Notification sink and per-user notification management.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use eventhub_core::error::AppError;
use eventhub_core::result::AppResult;
use eventhub_core::traits::clock::Clock;
use eventhub_database::repositories::NotificationRepository;
use eventhub_entity::event::Event;
use eventhub_entity::notification::Notification;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Records notifications for event members and serves them back to users.
#[derive(Debug, Clone)]
pub struct NotificationService {
    notif_repo: Arc<dyn NotificationRepository>,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    /// Creates a new notification service.
    pub fn new(notif_repo: Arc<dyn NotificationRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { notif_repo, clock }
    }

    /// Creates one notification per current member of `event`.
    ///
    /// Members are snapshotted by the durable store at write time; a user
    /// joining or leaving concurrently is either fully in or fully out.
    pub async fn fan_out(&self, event: &Event, body: &str) -> AppResult<Vec<Notification>> {
        let created = self
            .notif_repo
            .create_for_members(event.id, body, self.clock.now())
            .await?;
        debug!(event_id = %event.id, recipients = created.len(), "Notifications recorded");
        Ok(created)
    }

    /// Lists a user's notifications, newest first.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Notification>> {
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(AppError::validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if offset < 0 {
            return Err(AppError::validation("offset must not be negative"));
        }
        self.notif_repo.list_for_user(user_id, limit, offset).await
    }

    /// Counts a user's notifications.
    pub async fn count_for_user(&self, user_id: Uuid) -> AppResult<i64> {
        self.notif_repo.count_for_user(user_id).await
    }

    /// Deletes one of the user's notifications.
    pub async fn delete_for_user(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<()> {
        if !self
            .notif_repo
            .delete_for_user(user_id, notification_id)
            .await?
        {
            return Err(AppError::not_found(format!(
                "Notification {notification_id} not found"
            )));
        }
        Ok(())
    }

    /// Deletes all of the user's notifications and returns how many there were.
    pub async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let removed = self.notif_repo.delete_all_for_user(user_id).await?;
        info!(%user_id, removed, "Cleared notifications");
        Ok(removed)
    }
}
