//! # eventhub-core
//!
//! Core crate for EventHub. Contains the configuration schema, the unified
//! error system, the cache provider trait and the clock abstraction used by
//! the scheduler.
//!
//! This crate has **no** internal dependencies on other EventHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::AppError;
pub use result::AppResult;
