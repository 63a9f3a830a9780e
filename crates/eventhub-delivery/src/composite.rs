//! Fan one notification out to several channels.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use eventhub_core::error::AppError;
use eventhub_core::result::AppResult;
use eventhub_entity::event::EventSnapshot;

use crate::channel::{DeliveryChannel, DeliveryReport};

/// Runs every inner channel concurrently and merges their reports.
///
/// A failing channel does not prevent the others from delivering. The
/// composite only fails when every inner channel failed.
#[derive(Debug, Default, Clone)]
pub struct CompositeChannel {
    channels: Vec<Arc<dyn DeliveryChannel>>,
}

impl CompositeChannel {
    /// Create an empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel.
    pub fn with_channel(mut self, channel: Arc<dyn DeliveryChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Number of inner channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether there is no inner channel.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait]
impl DeliveryChannel for CompositeChannel {
    fn name(&self) -> &str {
        "composite"
    }

    async fn notify(&self, snapshot: &EventSnapshot, message: &str) -> AppResult<DeliveryReport> {
        if self.channels.is_empty() {
            debug!(event_id = %snapshot.event.id, "No delivery channels configured");
            return Ok(DeliveryReport::default());
        }

        let results = join_all(
            self.channels
                .iter()
                .map(|channel| channel.notify(snapshot, message)),
        )
        .await;

        let mut report = DeliveryReport::default();
        let mut failures = 0;
        for (channel, result) in self.channels.iter().zip(results) {
            match result {
                Ok(part) => report += part,
                Err(e) => {
                    failures += 1;
                    warn!(
                        channel = channel.name(),
                        event_id = %snapshot.event.id,
                        error = %e,
                        "Delivery channel failed"
                    );
                }
            }
        }

        if failures == self.channels.len() {
            return Err(AppError::channel(format!(
                "All {failures} delivery channels failed for event {}",
                snapshot.event.id
            )));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use eventhub_core::error::ErrorKind;
    use eventhub_entity::event::Event;

    use super::*;

    #[derive(Debug)]
    struct Fixed(AppResult<DeliveryReport>);

    #[async_trait]
    impl DeliveryChannel for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn notify(&self, _snapshot: &EventSnapshot, _message: &str) -> AppResult<DeliveryReport> {
            self.0.clone()
        }
    }

    fn snapshot() -> EventSnapshot {
        let organizer = Uuid::new_v4();
        EventSnapshot {
            event: Event::new(organizer, "b", "g", 2, Utc::now(), Utc::now()),
            members: vec![organizer],
        }
    }

    #[tokio::test]
    async fn test_merges_reports_and_tolerates_one_failure() {
        let ok = DeliveryReport {
            delivered: 2,
            skipped: 1,
            failed: 0,
        };
        let composite = CompositeChannel::new()
            .with_channel(Arc::new(Fixed(Ok(ok))))
            .with_channel(Arc::new(Fixed(Err(AppError::channel("down")))))
            .with_channel(Arc::new(Fixed(Ok(ok))));

        let report = composite.notify(&snapshot(), "hi").await.unwrap();
        assert_eq!(report.delivered, 4);
        assert_eq!(report.skipped, 2);
    }

    #[tokio::test]
    async fn test_all_failed() {
        let composite =
            CompositeChannel::new().with_channel(Arc::new(Fixed(Err(AppError::channel("down")))));
        let err = composite.notify(&snapshot(), "hi").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Channel);
    }

    #[tokio::test]
    async fn test_empty_composite_is_a_noop() {
        let report = CompositeChannel::new().notify(&snapshot(), "hi").await.unwrap();
        assert_eq!(report.total(), 0);
    }
}
