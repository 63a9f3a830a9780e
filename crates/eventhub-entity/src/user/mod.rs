//! User directory projection.

pub mod model;

pub use model::User;
