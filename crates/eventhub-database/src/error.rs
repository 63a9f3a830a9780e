//! Mapping of sqlx failures into [`AppError`].

use eventhub_core::error::{AppError, ErrorKind};

/// Convert a sqlx error, classifying constraint violations.
///
/// Unique violations become `Conflict`, foreign key violations `NotFound`,
/// everything else `Store`.
pub fn map_sqlx(e: sqlx::Error, context: &str) -> AppError {
    let kind = match e.as_database_error() {
        Some(db) if db.is_unique_violation() => ErrorKind::Conflict,
        Some(db) if db.is_foreign_key_violation() => ErrorKind::NotFound,
        _ => ErrorKind::Store,
    };
    AppError::with_source(kind, format!("{context}: {e}"), e)
}
