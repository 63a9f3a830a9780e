//! Event storage and request-facing use cases.

pub mod dto;
pub mod service;
pub mod store;
