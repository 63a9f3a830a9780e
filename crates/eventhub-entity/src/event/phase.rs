//! Event lifecycle classification.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an existing event stands relative to an effective tick time `N'`,
/// its start `T` and the pre-notification window `W`.
///
/// A deleted event has no phase; it is simply absent from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// `N' < T - W`, or already pre-notified with `N' < T`. Nothing to do.
    Scheduled,
    /// `T - W <= N' < T` and not yet pre-notified.
    Approaching,
    /// `N' >= T`. The event is announced and removed.
    Starting,
}

impl LifecyclePhase {
    /// Classify from raw fields.
    pub fn classify(
        starts_at: DateTime<Utc>,
        pre_notified: bool,
        effective_now: DateTime<Utc>,
        pre_window: chrono::Duration,
    ) -> Self {
        if effective_now >= starts_at {
            Self::Starting
        } else if !pre_notified && effective_now >= starts_at - pre_window {
            Self::Approaching
        } else {
            Self::Scheduled
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Approaching => write!(f, "approaching"),
            Self::Starting => write!(f, "starting"),
        }
    }
}
