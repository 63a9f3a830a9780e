//! Lifecycle scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Settings for the periodic event lifecycle scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the scheduler task is started at all.
    #[serde(default = "super::default_true")]
    pub enabled: bool,
    /// Seconds between the start of two consecutive ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: u64,
    /// How long before the start an event enters the approaching window.
    #[serde(default = "default_pre_window")]
    pub pre_window_seconds: u64,
    /// Shift applied to the tick time so that an event starting a few
    /// seconds after a tick is handled by that tick rather than the next.
    #[serde(default = "default_drift_slack")]
    pub drift_slack_seconds: u64,
    /// Upper bound for each durable step.
    #[serde(default = "default_step_timeout")]
    pub step_timeout_seconds: u64,
    /// Upper bound for one channel call covering all members of an event.
    /// Channels bound each send themselves; this only guards against a
    /// channel that never returns.
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_seconds: u64,
    /// Delay the first tick to the next wall-clock minute boundary.
    #[serde(default = "super::default_true")]
    pub align_to_minute: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_seconds: default_tick_interval(),
            pre_window_seconds: default_pre_window(),
            drift_slack_seconds: default_drift_slack(),
            step_timeout_seconds: default_step_timeout(),
            delivery_timeout_seconds: default_delivery_timeout(),
            align_to_minute: true,
        }
    }
}

impl SchedulerConfig {
    /// Tick interval as a [`Duration`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    /// Pre-notification window as a [`chrono::Duration`].
    pub fn pre_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.pre_window_seconds as i64)
    }

    /// Drift slack as a [`chrono::Duration`].
    pub fn drift_slack(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.drift_slack_seconds as i64)
    }

    /// Per-step timeout as a [`Duration`].
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_seconds)
    }

    /// Per-event delivery timeout as a [`Duration`].
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_seconds)
    }

    pub(crate) fn validate(&self) -> Result<(), AppError> {
        if self.tick_interval_seconds == 0 {
            return Err(AppError::configuration(
                "scheduler.tick_interval_seconds must be positive",
            ));
        }
        if self.pre_window_seconds == 0 {
            return Err(AppError::configuration(
                "scheduler.pre_window_seconds must be positive",
            ));
        }
        if self.step_timeout_seconds == 0 {
            return Err(AppError::configuration(
                "scheduler.step_timeout_seconds must be positive",
            ));
        }
        if self.delivery_timeout_seconds == 0 {
            return Err(AppError::configuration(
                "scheduler.delivery_timeout_seconds must be positive",
            ));
        }
        if self.drift_slack_seconds >= self.tick_interval_seconds {
            return Err(AppError::configuration(
                "scheduler.drift_slack_seconds must be smaller than the tick interval",
            ));
        }
        Ok(())
    }
}

fn default_tick_interval() -> u64 {
    60
}

fn default_pre_window() -> u64 {
    600
}

fn default_drift_slack() -> u64 {
    30
}

fn default_step_timeout() -> u64 {
    5
}

fn default_delivery_timeout() -> u64 {
    60
}
