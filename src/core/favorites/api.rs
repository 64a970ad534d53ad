//! Favorite API endpoints
//!
//! All routes require an access token:
//! - GET /api/favorites - List the caller's favorite pollutions
//! - GET /api/favorites/{pollutionId} - Whether a pollution is a favorite
//! - POST /api/favorites/{pollutionId} - Add a favorite
//! - DELETE /api/favorites/{pollutionId} - Remove a favorite

use axum::{
    Json, Router,
    extract::{FromRef, Path, State, rejection::PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::auth::{AuthUser, JwtService};
use crate::core::db::repositories::{FavoriteRepository, FavoriteRepositoryError};
use crate::core::error::{error_response, internal_error_response, path_uuid, validation_response};
use crate::core::models::{FavoriteStatus, MessageResponse, Pollution};
use crate::core::validation::ValidationErrors;

/// Favorite API state containing the favorite repository and JWT service
#[derive(Clone)]
pub struct FavoriteApiState {
    pub favorite_repo: FavoriteRepository,
    pub jwt_service: JwtService,
}

impl FromRef<Arc<FavoriteApiState>> for JwtService {
    fn from_ref(state: &Arc<FavoriteApiState>) -> Self {
        state.jwt_service.clone()
    }
}

/// Favorite API error types
#[derive(Debug, thiserror::Error)]
pub enum FavoriteApiError {
    #[error("Pollution not found")]
    PollutionNotFound,

    #[error("Favorite not found")]
    NotFound,

    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<FavoriteRepositoryError> for FavoriteApiError {
    fn from(err: FavoriteRepositoryError) -> Self {
        match err {
            FavoriteRepositoryError::UserNotFound => FavoriteApiError::UserNotFound,
            FavoriteRepositoryError::DatabaseError(e) => {
                FavoriteApiError::InternalError(e.to_string())
            }
        }
    }
}

impl IntoResponse for FavoriteApiError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            FavoriteApiError::PollutionNotFound => (StatusCode::NOT_FOUND, "POLLUTION_NOT_FOUND"),
            FavoriteApiError::NotFound => (StatusCode::NOT_FOUND, "FAVORITE_NOT_FOUND"),
            FavoriteApiError::UserNotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            FavoriteApiError::Validation(errors) => return validation_response(errors),
            FavoriteApiError::InternalError(detail) => return internal_error_response(&detail),
        };

        error_response(status, code, self.to_string())
    }
}

/// Create the favorite API router
pub fn favorite_api_router(state: FavoriteApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/favorites", get(list_handler))
        .route(
            "/api/favorites/{pollution_id}",
            get(status_handler).post(add_handler).delete(remove_handler),
        )
        .with_state(state)
}

/// GET /api/favorites
async fn list_handler(
    State(state): State<Arc<FavoriteApiState>>,
    user: AuthUser,
) -> Result<Json<Vec<Pollution>>, FavoriteApiError> {
    let favorites = state.favorite_repo.list_for_user(user.user_id).await?;

    Ok(Json(favorites))
}

/// GET /api/favorites/{pollutionId}
async fn status_handler(
    State(state): State<Arc<FavoriteApiState>>,
    user: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<FavoriteStatus>, FavoriteApiError> {
    let pollution_id = path_uuid(path, "pollutionId")?;

    let is_favorite = state
        .favorite_repo
        .exists(user.user_id, pollution_id)
        .await?;

    Ok(Json(FavoriteStatus { is_favorite }))
}

/// POST /api/favorites/{pollutionId}
/// Adding twice is a no-op
async fn add_handler(
    State(state): State<Arc<FavoriteApiState>>,
    user: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), FavoriteApiError> {
    let pollution_id = path_uuid(path, "pollutionId")?;

    state
        .favorite_repo
        .add(user.user_id, pollution_id)
        .await?
        .ok_or(FavoriteApiError::PollutionNotFound)?;

    tracing::debug!(user_id = %user.user_id, pollution_id = %pollution_id, "Favorite added");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Added to favorites")),
    ))
}

/// DELETE /api/favorites/{pollutionId}
async fn remove_handler(
    State(state): State<Arc<FavoriteApiState>>,
    user: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, FavoriteApiError> {
    let pollution_id = path_uuid(path, "pollutionId")?;

    if !state
        .favorite_repo
        .remove(user.user_id, pollution_id)
        .await?
    {
        return Err(FavoriteApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}
