//! PostgreSQL repository implementations.

pub mod event;
pub mod game;
pub mod notification;
pub mod user;

pub use event::PgEventRepository;
pub use game::PgGameRepository;
pub use notification::PgNotificationRepository;
pub use user::PgUserRepository;
