//! Unified application error types for EventHub.
//!
//! Every crate maps its internal failures into [`AppError`] so that the
//! scheduler and the request-facing services can reason about a single
//! error taxonomy.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested record does not exist.
    NotFound,
    /// Input validation failed.
    Validation,
    /// Duplicate id, duplicate membership or a full event.
    Conflict,
    /// The durable store is unreachable or rejected the operation.
    Store,
    /// The ephemeral cache failed.
    Cache,
    /// A delivery channel is unusable as a whole.
    Channel,
    /// A bounded step exceeded its deadline.
    Timeout,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// A configuration error occurred.
    Configuration,
    /// An internal error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Store => write!(f, "STORE"),
            Self::Cache => write!(f, "CACHE"),
            Self::Channel => write!(f, "CHANNEL"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified application error used throughout EventHub.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a durable store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Store, message)
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cache, message)
    }

    /// Create a delivery channel error.
    pub fn channel(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Channel, message)
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Whether this error kind is expected to clear up on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Store | ErrorKind::Timeout)
    }

    /// Shorthand for `self.kind == ErrorKind::NotFound`.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::with_source(ErrorKind::Timeout, "Operation timed out", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind() {
        let err = AppError::not_found("event 42");
        assert_eq!(err.to_string(), "NOT_FOUND: event 42");
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(AppError::store("down").is_retryable());
        assert!(AppError::timeout("slow").is_retryable());
        assert!(!AppError::conflict("full").is_retryable());
        assert!(!AppError::not_found("gone").is_retryable());
    }

    #[test]
    fn test_clone_drops_source() {
        let inner = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = AppError::from(inner);
        assert!(std::error::Error::source(&err).is_some());
        let cloned = err.clone();
        assert_eq!(cloned.kind, ErrorKind::Serialization);
        assert!(cloned.source.is_none());
    }

    #[tokio::test]
    async fn test_elapsed_maps_to_timeout() {
        let res = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            std::future::pending::<()>(),
        )
        .await;
        let err: AppError = res.unwrap_err().into();
        assert_eq!(err.kind, ErrorKind::Timeout);
    }
}
