//! Process-wide mapping from users to Telegram chat ids.

use dashmap::DashMap;
use uuid::Uuid;

/// Known chat ids, shared by the delivery channel and the subscription bot.
///
/// Entries are filled lazily from the user directory and updated when a
/// user opts in or out through the bot. Constructed once at startup and
/// handed to its users explicitly.
#[derive(Debug, Default)]
pub struct RecipientRegistry {
    chats: DashMap<Uuid, i64>,
}

impl RecipientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Chat id of a user, if known.
    pub fn chat_id(&self, user_id: Uuid) -> Option<i64> {
        self.chats.get(&user_id).map(|entry| *entry.value())
    }

    /// Remember a user's chat id.
    pub fn insert(&self, user_id: Uuid, chat_id: i64) {
        self.chats.insert(user_id, chat_id);
    }

    /// Forget a user's chat id.
    pub fn remove(&self, user_id: Uuid) -> Option<i64> {
        self.chats.remove(&user_id).map(|(_, chat)| chat)
    }

    /// Number of known chats.
    pub fn len(&self) -> usize {
        self.chats.len()
    }

    /// Whether no chat is known.
    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}
