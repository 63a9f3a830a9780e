//! # eventhub-service
//!
//! Business logic for EventHub: the cache-aside [`EventStore`] with its
//! membership operations, the request-facing [`EventService`], and the
//! [`NotificationService`] that records per-member notifications.

pub mod event;
pub mod notification;

pub use event::service::EventService;
pub use event::store::EventStore;
pub use notification::service::NotificationService;
