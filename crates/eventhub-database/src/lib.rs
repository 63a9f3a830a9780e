//! # eventhub-database
//!
//! Durable store for EventHub: PostgreSQL connection management, migrations,
//! the repository traits the services depend on, and two implementations of
//! them (PostgreSQL and an in-process store used for tests and local runs).

pub mod connection;
pub mod error;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::memory::MemoryDatabase;
pub use repositories::{
    EventRepository, GameRepository, NotificationRepository, UserRepository,
};
