//! Event domain entities.

pub mod membership;
pub mod model;
pub mod phase;

pub use membership::Membership;
pub use model::{Event, EventSnapshot};
pub use phase::LifecyclePhase;
