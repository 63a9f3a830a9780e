//! Telegram delivery channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use eventhub_core::error::AppError;
use eventhub_core::result::AppResult;
use eventhub_database::repositories::UserRepository;
use eventhub_entity::event::EventSnapshot;

use super::api::ChatSender;
use crate::channel::{DeliveryChannel, DeliveryReport};
use crate::registry::RecipientRegistry;

/// Sends in flight at once for one event unless configured otherwise.
const DEFAULT_MAX_CONCURRENT_SENDS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendOutcome {
    Delivered,
    Skipped,
    Failed,
}

/// Sends event notifications to members who opted in through the bot.
///
/// Members are messaged concurrently and every send carries its own
/// timeout, so a stalled chat costs at most one `send_timeout` and never
/// holds back the other members.
#[derive(Debug, Clone)]
pub struct TelegramChannel {
    sender: Arc<dyn ChatSender>,
    registry: Arc<RecipientRegistry>,
    users: Arc<dyn UserRepository>,
    send_timeout: Duration,
    max_concurrent_sends: usize,
}

impl TelegramChannel {
    /// Creates a new Telegram channel.
    pub fn new(
        sender: Arc<dyn ChatSender>,
        registry: Arc<RecipientRegistry>,
        users: Arc<dyn UserRepository>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            sender,
            registry,
            users,
            send_timeout,
            max_concurrent_sends: DEFAULT_MAX_CONCURRENT_SENDS,
        }
    }

    /// Limit how many sends run at once for one event.
    pub fn with_max_concurrent_sends(mut self, max: usize) -> Self {
        self.max_concurrent_sends = max.max(1);
        self
    }

    async fn send_one(&self, event_id: Uuid, user_id: Uuid, chat_id: Option<i64>, message: &str) -> SendOutcome {
        let Some(chat_id) = chat_id else {
            debug!(%event_id, %user_id, "Member has no Telegram chat, skipping");
            return SendOutcome::Skipped;
        };

        match tokio::time::timeout(self.send_timeout, self.sender.send_message(chat_id, message)).await {
            Ok(Ok(())) => SendOutcome::Delivered,
            Ok(Err(e)) => {
                warn!(%event_id, %user_id, error = %e, "Failed to send Telegram message");
                SendOutcome::Failed
            }
            Err(_) => {
                warn!(%event_id, %user_id, "Telegram send timed out");
                SendOutcome::Failed
            }
        }
    }

    /// Fill the registry for members it does not know yet.
    ///
    /// Returns `false` if the directory lookup failed.
    async fn resolve_missing(&self, members: &[Uuid]) -> bool {
        let missing: Vec<Uuid> = members
            .iter()
            .copied()
            .filter(|id| self.registry.chat_id(*id).is_none())
            .collect();
        if missing.is_empty() {
            return true;
        }

        match self.users.find_chat_ids(&missing).await {
            Ok(found) => {
                for (user_id, chat_id) in found {
                    self.registry.insert(user_id, chat_id);
                }
                true
            }
            Err(e) => {
                warn!(error = %e, missing = missing.len(), "Failed to resolve Telegram chat ids");
                false
            }
        }
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn notify(&self, snapshot: &EventSnapshot, message: &str) -> AppResult<DeliveryReport> {
        let event_id = snapshot.event.id;
        let lookup_ok = self.resolve_missing(&snapshot.members).await;

        let targets: Vec<(Uuid, Option<i64>)> = snapshot
            .members
            .iter()
            .map(|id| (*id, self.registry.chat_id(*id)))
            .collect();

        if !lookup_ok && targets.iter().all(|(_, chat)| chat.is_none()) && !targets.is_empty() {
            return Err(AppError::channel(format!(
                "No Telegram recipients could be resolved for event {event_id}"
            )));
        }

        let outcomes: Vec<SendOutcome> = stream::iter(targets)
            .map(|(user_id, chat_id)| self.send_one(event_id, user_id, chat_id, message))
            .buffer_unordered(self.max_concurrent_sends)
            .collect()
            .await;

        let mut report = DeliveryReport::default();
        for outcome in outcomes {
            match outcome {
                SendOutcome::Delivered => report.delivered += 1,
                SendOutcome::Skipped => report.skipped += 1,
                SendOutcome::Failed => report.failed += 1,
            }
        }

        info!(
            %event_id,
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            "Telegram delivery finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Utc;
    use tokio::sync::Mutex;

    use eventhub_core::error::ErrorKind;
    use eventhub_database::MemoryDatabase;
    use eventhub_entity::event::Event;
    use eventhub_entity::user::User;

    use super::*;

    /// Records sends, fails for selected chats and hangs for others.
    #[derive(Debug, Default)]
    struct FakeSender {
        failing: HashSet<i64>,
        stalled: HashSet<i64>,
        sent: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl ChatSender for FakeSender {
        async fn send_message(&self, chat_id: i64, text: &str) -> AppResult<()> {
            if self.stalled.contains(&chat_id) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.failing.contains(&chat_id) {
                return Err(AppError::channel("Forbidden: bot was blocked by the user"));
            }
            self.sent.lock().await.push((chat_id, text.to_string()));
            Ok(())
        }
    }

    /// Directory that is always down.
    #[derive(Debug)]
    struct DownDirectory;

    #[async_trait]
    impl UserRepository for DownDirectory {
        async fn find_by_id(&self, _id: Uuid) -> AppResult<Option<User>> {
            Err(AppError::store("down"))
        }
        async fn find_by_telegram_username(&self, _handle: &str) -> AppResult<Option<User>> {
            Err(AppError::store("down"))
        }
        async fn set_chat_id(&self, _user_id: Uuid, _chat_id: Option<i64>) -> AppResult<bool> {
            Err(AppError::store("down"))
        }
        async fn find_chat_ids(&self, _user_ids: &[Uuid]) -> AppResult<Vec<(Uuid, i64)>> {
            Err(AppError::store("down"))
        }
    }

    fn user(name: &str, chat_id: Option<i64>) -> User {
        User {
            id: Uuid::new_v4(),
            username: name.to_string(),
            telegram_username: Some(name.to_string()),
            chat_id,
            created_at: Utc::now(),
        }
    }

    fn snapshot(members: &[&User]) -> EventSnapshot {
        EventSnapshot {
            event: Event::new(members[0].id, "lan", "quake", 8, Utc::now(), Utc::now()),
            members: members.iter().map(|u| u.id).collect(),
        }
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_abort() {
        let db = MemoryDatabase::new();
        let a = user("a", Some(1));
        let b = user("b", Some(2));
        let c = user("c", None);
        let d = user("d", Some(4));
        for u in [&a, &b, &c, &d] {
            db.upsert_user(u.clone()).await;
        }

        let sender = Arc::new(FakeSender {
            failing: HashSet::from([2]),
            ..Default::default()
        });
        let channel = TelegramChannel::new(
            sender.clone(),
            Arc::new(RecipientRegistry::new()),
            Arc::new(db),
            Duration::from_secs(1),
        );

        let report = channel
            .notify(&snapshot(&[&a, &b, &c, &d]), "starts soon")
            .await
            .unwrap();
        assert_eq!(
            report,
            DeliveryReport {
                delivered: 2,
                skipped: 1,
                failed: 1
            }
        );

        let sent = sender.sent.lock().await;
        let mut chats: Vec<i64> = sent.iter().map(|(chat, _)| *chat).collect();
        chats.sort();
        assert_eq!(chats, vec![1, 4]);
        assert!(sent.iter().all(|(_, text)| text == "starts soon"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_chats_do_not_hold_back_others() {
        let db = MemoryDatabase::new();
        let slow = user("slow", Some(1));
        let also_slow = user("also_slow", Some(2));
        let a = user("a", Some(3));
        let b = user("b", Some(4));
        for u in [&slow, &also_slow, &a, &b] {
            db.upsert_user(u.clone()).await;
        }

        let sender = Arc::new(FakeSender {
            stalled: HashSet::from([1, 2]),
            ..Default::default()
        });
        let channel = TelegramChannel::new(
            sender.clone(),
            Arc::new(RecipientRegistry::new()),
            Arc::new(db),
            Duration::from_secs(10),
        );

        let started = tokio::time::Instant::now();
        let report = channel
            .notify(&snapshot(&[&slow, &also_slow, &a, &b]), "starts soon")
            .await
            .unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 2);
        // Both stalled sends time out together, not one after the other.
        assert!(started.elapsed() < Duration::from_secs(11));

        let mut chats: Vec<i64> = sender.sent.lock().await.iter().map(|(chat, _)| *chat).collect();
        chats.sort();
        assert_eq!(chats, vec![3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_limit_still_reports_every_member() {
        let db = MemoryDatabase::new();
        let slow = user("slow", Some(1));
        let a = user("a", Some(2));
        for u in [&slow, &a] {
            db.upsert_user(u.clone()).await;
        }

        let sender = Arc::new(FakeSender {
            stalled: HashSet::from([1]),
            ..Default::default()
        });
        let channel = TelegramChannel::new(
            sender.clone(),
            Arc::new(RecipientRegistry::new()),
            Arc::new(db),
            Duration::from_secs(5),
        )
        .with_max_concurrent_sends(1);

        let report = channel.notify(&snapshot(&[&slow, &a]), "hi").await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_registry_is_used_when_directory_is_down() {
        let a = user("a", None);
        let b = user("b", None);
        let registry = Arc::new(RecipientRegistry::new());
        registry.insert(a.id, 10);

        let sender = Arc::new(FakeSender::default());
        let channel = TelegramChannel::new(
            sender.clone(),
            registry,
            Arc::new(DownDirectory),
            Duration::from_secs(1),
        );

        let report = channel.notify(&snapshot(&[&a, &b]), "hi").await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_unusable_when_nothing_resolves() {
        let a = user("a", None);
        let channel = TelegramChannel::new(
            Arc::new(FakeSender::default()),
            Arc::new(RecipientRegistry::new()),
            Arc::new(DownDirectory),
            Duration::from_secs(1),
        );

        let err = channel.notify(&snapshot(&[&a]), "hi").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Channel);
    }
}
