//! Notification sink and per-user notification management.

pub mod service;
