//! Lifecycle scheduler.
//!
//! Each tick runs two scans against the durable store. Events entering the
//! pre-notification window get a "starts soon" notification and are flagged;
//! events whose start has been reached get a "has started" notification and
//! are deleted. The flag and the deletion are the only idempotency guards, so
//! a transition that fails halfway is retried on the next tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use eventhub_core::config::scheduler::SchedulerConfig;
use eventhub_core::error::AppError;
use eventhub_core::result::AppResult;
use eventhub_core::traits::clock::Clock;
use eventhub_delivery::DeliveryChannel;
use eventhub_entity::event::{Event, EventSnapshot, LifecyclePhase};
use eventhub_service::{EventStore, NotificationService};

use crate::messages;
use crate::schedule::get_start_delay;

/// Counts for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Events flagged as pre-notified.
    pub approached: usize,
    /// Events that started and were removed.
    pub started: usize,
    /// Transitions that failed and will be retried next tick.
    pub failed: usize,
    /// Transitions that lost a race with a concurrent delete.
    pub skipped: usize,
    /// The stop signal arrived before every transition was attempted.
    pub interrupted: bool,
}

impl TickReport {
    /// Whether the tick did anything worth logging.
    pub fn is_idle(&self) -> bool {
        self.approached + self.started + self.failed + self.skipped == 0
    }

    fn record(&mut self, phase: LifecyclePhase, event_id: Uuid, result: AppResult<Outcome>) {
        match (result, phase) {
            (Ok(Outcome::Applied), LifecyclePhase::Approaching) => self.approached += 1,
            (Ok(Outcome::Applied), _) => self.started += 1,
            (Ok(Outcome::Gone), _) => {
                debug!(%event_id, ?phase, "Event vanished during transition");
                self.skipped += 1;
            }
            (Err(e), _) => {
                error!(%event_id, ?phase, error = %e, "Lifecycle transition failed");
                self.failed += 1;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied,
    Gone,
}

/// Drives events through Scheduled, Approaching and Starting.
#[derive(Debug, Clone)]
pub struct LifecycleScheduler {
    store: Arc<EventStore>,
    notifications: Arc<NotificationService>,
    channel: Arc<dyn DeliveryChannel>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl LifecycleScheduler {
    /// Creates a new lifecycle scheduler.
    pub fn new(
        store: Arc<EventStore>,
        notifications: Arc<NotificationService>,
        channel: Arc<dyn DeliveryChannel>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            notifications,
            channel,
            clock,
            config,
        }
    }

    /// Run ticks until the stop signal is received.
    ///
    /// Ticks never overlap: a slow tick delays the next one and missed
    /// intervals are skipped.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.tick_interval_seconds,
            pre_window_secs = self.config.pre_window_seconds,
            drift_slack_secs = self.config.drift_slack_seconds,
            "Lifecycle scheduler started"
        );

        if self.config.align_to_minute {
            let delay = get_start_delay(self.clock.now().timestamp_millis(), 0);
            debug!(delay_secs = delay, "Aligning first tick to the minute");
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        info!("Lifecycle scheduler stopped before first tick");
                        return;
                    }
                }
                _ = time::sleep(Duration::from_secs(delay)) => {}
            }
        }

        let mut ticker = time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }
            if *stop.borrow() {
                break;
            }

            let report = self.tick(self.clock.now(), Some(&stop)).await;
            if report.is_idle() {
                debug!("Lifecycle tick finished, nothing to do");
            } else {
                info!(
                    approached = report.approached,
                    started = report.started,
                    failed = report.failed,
                    skipped = report.skipped,
                    "Lifecycle tick finished"
                );
            }
            if report.interrupted {
                break;
            }
        }

        info!("Lifecycle scheduler stopped");
    }

    /// Run a single tick as if the current time were `now`.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        self.tick(now, None).await
    }

    async fn tick(&self, now: DateTime<Utc>, stop: Option<&watch::Receiver<bool>>) -> TickReport {
        let effective = now + self.config.drift_slack();
        let pre_window = self.config.pre_window();
        let mut report = TickReport::default();

        // Approaching: effective < T <= effective + W, not yet notified.
        match self
            .step(
                "approaching scan",
                self.store.fetch_window(Some(effective), effective + pre_window),
            )
            .await
        {
            Ok(events) => {
                for event in events
                    .iter()
                    .filter(|e| e.phase(effective, pre_window) == LifecyclePhase::Approaching)
                {
                    if stopped(stop) {
                        report.interrupted = true;
                        return report;
                    }
                    let result = self.approach(event, now).await;
                    report.record(LifecyclePhase::Approaching, event.id, result);
                }
            }
            Err(e) => error!(error = %e, "Failed to scan approaching events"),
        }

        // Starting: T <= effective.
        match self
            .step("starting scan", self.store.fetch_window(None, effective))
            .await
        {
            Ok(events) => {
                for event in &events {
                    if stopped(stop) {
                        report.interrupted = true;
                        return report;
                    }
                    let result = self.start(event).await;
                    report.record(LifecyclePhase::Starting, event.id, result);
                }
            }
            Err(e) => error!(error = %e, "Failed to scan starting events"),
        }

        report
    }

    async fn approach(&self, event: &Event, now: DateTime<Utc>) -> AppResult<Outcome> {
        let body = messages::approaching(event, event.minutes_until_start(now));
        let snapshot = self.fan_out(event, &body).await?;
        self.deliver(&snapshot, &body).await;

        // Only the flag is written, so a reschedule since the scan survives.
        match self
            .step("flag", self.store.mark_pre_notified(event.id))
            .await
        {
            Ok(_) => {
                info!(event_id = %event.id, members = snapshot.members.len(), "Event pre-notified");
                Ok(Outcome::Applied)
            }
            Err(e) if e.is_not_found() => Ok(Outcome::Gone),
            Err(e) => Err(e),
        }
    }

    async fn start(&self, event: &Event) -> AppResult<Outcome> {
        let body = messages::started(event);
        let snapshot = self.fan_out(event, &body).await?;
        self.deliver(&snapshot, &body).await;

        if self.step("delete", self.store.delete(event.id)).await? {
            info!(event_id = %event.id, members = snapshot.members.len(), "Event started");
            Ok(Outcome::Applied)
        } else {
            Ok(Outcome::Gone)
        }
    }

    /// Record one notification per member and return the recipients as the
    /// snapshot handed to the channel.
    async fn fan_out(&self, event: &Event, body: &str) -> AppResult<EventSnapshot> {
        let created = self
            .step("fan-out", self.notifications.fan_out(event, body))
            .await?;
        Ok(EventSnapshot {
            event: event.clone(),
            members: created.iter().map(|n| n.recipient_id).collect(),
        })
    }

    async fn deliver(&self, snapshot: &EventSnapshot, body: &str) {
        if snapshot.members.is_empty() {
            return;
        }
        let event_id = snapshot.event.id;
        match time::timeout(self.config.delivery_timeout(), self.channel.notify(snapshot, body)).await {
            Ok(Ok(report)) => debug!(
                %event_id,
                channel = self.channel.name(),
                delivered = report.delivered,
                skipped = report.skipped,
                failed = report.failed,
                "Delivery attempted"
            ),
            Ok(Err(e)) => warn!(
                %event_id,
                channel = self.channel.name(),
                error = %e,
                "Delivery failed"
            ),
            Err(_) => warn!(
                %event_id,
                channel = self.channel.name(),
                timeout_secs = self.config.delivery_timeout_seconds,
                "Delivery timed out"
            ),
        }
    }

    async fn step<T>(&self, what: &str, fut: impl Future<Output = AppResult<T>>) -> AppResult<T> {
        match time::timeout(self.config.step_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::timeout(format!(
                "{what} exceeded {}s",
                self.config.step_timeout_seconds
            ))),
        }
    }
}

fn stopped(stop: Option<&watch::Receiver<bool>>) -> bool {
    stop.is_some_and(|rx| *rx.borrow())
}
