//! # eventhub-delivery
//!
//! The boundary between the lifecycle scheduler and the outside world.
//! A [`DeliveryChannel`] receives one call per event per lifecycle
//! transition and is responsible for reaching each member; per-member
//! failures are reported, never raised.
//!
//! The Telegram implementation talks to the Bot HTTP API and resolves
//! member chat ids through an explicitly owned [`RecipientRegistry`].

pub mod channel;
pub mod composite;
pub mod registry;
pub mod telegram;

pub use channel::{DeliveryChannel, DeliveryReport};
pub use composite::CompositeChannel;
pub use registry::RecipientRegistry;
pub use telegram::{BotApi, ChatSender, SubscriptionBot, TelegramChannel};
