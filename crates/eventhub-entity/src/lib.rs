//! # eventhub-entity
//!
//! Domain entity models for EventHub. Every struct in this crate represents
//! a database table row or a domain value object. Row types additionally
//! derive `sqlx::FromRow`.

pub mod event;
pub mod game;
pub mod notification;
pub mod user;
