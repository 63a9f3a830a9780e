//! Subscription bot: lets users opt in to Telegram notifications.
//!
//! A user writes to the bot from the Telegram account whose handle is on
//! their profile. "subscribe" records the chat id, "unsubscribe" clears it,
//! anything else is answered with a prompt.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info, warn};

use eventhub_core::result::AppResult;
use eventhub_database::repositories::UserRepository;

use super::api::{BotApi, ChatSender, TelegramUpdate};
use crate::registry::RecipientRegistry;

/// Pause after a failed poll before trying again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// What the bot answers to an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotReply {
    /// Chat id stored.
    Subscribed,
    /// The user was already subscribed.
    AlreadySubscribed,
    /// Chat id cleared.
    Unsubscribed,
    /// The user was not subscribed.
    NotSubscribed,
    /// The sender's handle is not linked to any account.
    UnknownUser,
    /// Anything else.
    Prompt,
}

impl BotReply {
    /// Text sent back to the chat.
    pub fn text(&self) -> &'static str {
        match self {
            Self::Subscribed => "You will now be notified when events you joined are about to start.",
            Self::AlreadySubscribed => "You are already subscribed to event notifications.",
            Self::Unsubscribed => "You have unsubscribed from event notifications.",
            Self::NotSubscribed => "You are not subscribed to event notifications.",
            Self::UnknownUser => {
                "Your Telegram username is not linked to an account. Add it to your profile first."
            }
            Self::Prompt => {
                "Do you want to be notified when events you joined start? Reply \"subscribe\" or \"unsubscribe\"."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Subscribe,
    Unsubscribe,
    Other,
}

fn parse_command(text: &str) -> Command {
    match text.trim().trim_start_matches('/').to_lowercase().as_str() {
        "subscribe" | "yes" => Command::Subscribe,
        "unsubscribe" | "no" | "stop" => Command::Unsubscribe,
        _ => Command::Other,
    }
}

/// Long-polling opt-in bot.
#[derive(Debug, Clone)]
pub struct SubscriptionBot {
    api: Arc<BotApi>,
    users: Arc<dyn UserRepository>,
    registry: Arc<RecipientRegistry>,
    poll_timeout_seconds: u64,
}

impl SubscriptionBot {
    /// Creates a new subscription bot.
    pub fn new(
        api: Arc<BotApi>,
        users: Arc<dyn UserRepository>,
        registry: Arc<RecipientRegistry>,
        poll_timeout_seconds: u64,
    ) -> Self {
        Self {
            api,
            users,
            registry,
            poll_timeout_seconds,
        }
    }

    /// Poll for updates until the cancel signal is received.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        info!("Telegram subscription bot started");
        let mut offset = 0i64;

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                polled = self.api.get_updates(offset, self.poll_timeout_seconds) => match polled {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            self.handle_update(&update).await;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Telegram polling error");
                        tokio::select! {
                            changed = cancel.changed() => {
                                if changed.is_err() || *cancel.borrow() {
                                    break;
                                }
                            }
                            _ = time::sleep(POLL_ERROR_BACKOFF) => {}
                        }
                    }
                }
            }
        }

        info!("Telegram subscription bot stopped");
    }

    async fn handle_update(&self, update: &TelegramUpdate) {
        let Some(message) = update.message.as_ref() else {
            return;
        };
        let Some(text) = message.text.as_deref() else {
            return;
        };
        let from = message.from.as_ref();
        if from.is_some_and(|u| u.is_bot) {
            return;
        }
        let handle = from.and_then(|u| u.username.as_deref());
        let chat_id = message.chat.id;

        let reply = match self.handle_text(handle, chat_id, text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(chat_id, error = %e, "Failed to process bot message");
                return;
            }
        };

        if let Err(e) = self.api.send_message(chat_id, reply.text()).await {
            warn!(chat_id, error = %e, "Failed to reply to bot message");
        }
    }

    /// Apply one incoming message and decide the reply.
    pub async fn handle_text(&self, handle: Option<&str>, chat_id: i64, text: &str) -> AppResult<BotReply> {
        let command = parse_command(text);
        if command == Command::Other {
            return Ok(BotReply::Prompt);
        }

        let Some(handle) = handle else {
            return Ok(BotReply::UnknownUser);
        };
        let Some(user) = self.users.find_by_telegram_username(handle).await? else {
            debug!(handle, "Bot message from unlinked Telegram account");
            return Ok(BotReply::UnknownUser);
        };

        let reply = match (command, user.is_subscribed()) {
            (Command::Subscribe, true) => {
                self.registry.insert(user.id, chat_id);
                BotReply::AlreadySubscribed
            }
            (Command::Subscribe, false) => {
                self.users.set_chat_id(user.id, Some(chat_id)).await?;
                self.registry.insert(user.id, chat_id);
                info!(user_id = %user.id, "User subscribed to Telegram notifications");
                BotReply::Subscribed
            }
            (Command::Unsubscribe, true) => {
                self.users.set_chat_id(user.id, None).await?;
                self.registry.remove(user.id);
                info!(user_id = %user.id, "User unsubscribed from Telegram notifications");
                BotReply::Unsubscribed
            }
            (Command::Unsubscribe, false) => {
                self.registry.remove(user.id);
                BotReply::NotSubscribed
            }
            (Command::Other, _) => BotReply::Prompt,
        };
        Ok(reply)
    }
}
