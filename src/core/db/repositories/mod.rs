//! Database repositories for EcoWatch
//!
//! Repositories encapsulate data access logic and provide a clean API for
//! the HTTP handlers to interact with the database.

pub mod favorite;
pub mod pollution;
pub mod user;

pub use favorite::{FavoriteRepository, FavoriteRepositoryError};
pub use pollution::{PollutionRepository, PollutionRepositoryError};
pub use user::{UserRepository, UserRepositoryError};
