//! Outbound delivery channel configuration.

use serde::{Deserialize, Serialize};

/// All configured delivery channels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Telegram bot channel.
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// Telegram Bot API channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Whether notifications are pushed through Telegram.
    #[serde(default)]
    pub enabled: bool,
    /// Bot token issued by BotFather.
    #[serde(default)]
    pub bot_token: String,
    /// Base URL of the Bot API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Run the subscription bot that records chat ids of opted-in users.
    #[serde(default = "super::default_true")]
    pub poll_updates: bool,
    /// Long-polling timeout passed to `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
    /// HTTP request timeout for `sendMessage`, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Messages sent at once while notifying the members of one event.
    #[serde(default = "default_max_concurrent_sends")]
    pub max_concurrent_sends: usize,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            api_base_url: default_api_base_url(),
            poll_updates: true,
            poll_timeout_seconds: default_poll_timeout(),
            request_timeout_seconds: default_request_timeout(),
            max_concurrent_sends: default_max_concurrent_sends(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_concurrent_sends() -> usize {
    16
}
