//! # eventhub-worker
//!
//! The background lifecycle scheduler. On each tick it finds events entering
//! their pre-notification window and events that have started, records a
//! notification for every member, pushes it through the delivery channels and
//! then advances the event (flag it, or delete it).

pub mod messages;
pub mod schedule;
pub mod scheduler;

pub use scheduler::{LifecycleScheduler, TickReport};
