//! Telegram Bot API delivery.

pub mod api;
pub mod bot;
pub mod channel;

pub use api::{BotApi, ChatSender};
pub use bot::{BotReply, SubscriptionBot};
pub use channel::TelegramChannel;
