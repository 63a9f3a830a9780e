//! Game catalog entities.

pub mod model;

pub use model::Game;
