//! Per-user favorite pollutions

pub mod api;

pub use api::{FavoriteApiError, FavoriteApiState, favorite_api_router};
