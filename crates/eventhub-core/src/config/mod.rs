//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod cache;
pub mod database;
pub mod delivery;
pub mod logging;
pub mod scheduler;

use serde::{Deserialize, Serialize};

pub use self::cache::CacheConfig;
pub use self::database::DatabaseConfig;
pub use self::delivery::DeliveryConfig;
pub use self::logging::LoggingConfig;
pub use self::scheduler::SchedulerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Durable store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache provider settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Lifecycle scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Outbound delivery channel settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `EVENTHUB_`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("EVENTHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the runtime cannot operate with.
    pub fn validate(&self) -> Result<(), AppError> {
        self.scheduler.validate()?;

        if self.delivery.telegram.enabled && self.delivery.telegram.bot_token.trim().is_empty() {
            return Err(AppError::configuration(
                "delivery.telegram.bot_token is required when telegram delivery is enabled",
            ));
        }

        if self.delivery.telegram.enabled
            && self.scheduler.delivery_timeout_seconds <= self.delivery.telegram.request_timeout_seconds
        {
            return Err(AppError::configuration(
                "scheduler.delivery_timeout_seconds must exceed delivery.telegram.request_timeout_seconds",
            ));
        }

        match self.database.provider.as_str() {
            "postgres" | "memory" => {}
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown database provider: '{other}'. Supported: postgres, memory"
                )));
            }
        }

        Ok(())
    }
}

fn default_true() -> bool {
    true
}
