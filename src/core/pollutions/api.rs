//! Pollution API endpoints
//!
//! Provides REST API endpoints for pollution reports:
//! - GET /api/pollutions - Paginated, filtered list (public)
//! - GET /api/pollutions/{id} - Get one report (public)
//! - POST /api/pollutions - Report a pollution (public, multipart or JSON)
//! - PUT /api/pollutions/{id} - Update a report (auth required)
//! - DELETE /api/pollutions/{id} - Delete a report (auth required)
//!
//! When a valid access token is present, `isFavorite` reflects the caller's
//! favorites; otherwise it is always false.

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, FromRef, Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::auth::{AuthError, AuthUser, JwtService, MaybeAuthUser};
use crate::core::db::repositories::{PollutionRepository, PollutionRepositoryError};
use crate::core::error::{error_response, internal_error_response, path_uuid, validation_response};
use crate::core::models::{Paginated, Pollution};
use crate::core::pollutions::form::{PollutionForm, UploadError, UploadLimit};
use crate::core::validation::{
    PollutionQuery, ValidationErrors, validate_filters, validate_pollution_draft,
    validate_pollution_patch,
};

/// Room left for text fields and multipart framing on top of the photo
const FORM_OVERHEAD: usize = 64 * 1024;

/// Pollution API state containing the pollution repository and JWT service
#[derive(Clone)]
pub struct PollutionApiState {
    pub pollution_repo: PollutionRepository,
    pub jwt_service: JwtService,
    pub upload_max_size: usize,
}

impl FromRef<Arc<PollutionApiState>> for JwtService {
    fn from_ref(state: &Arc<PollutionApiState>) -> Self {
        state.jwt_service.clone()
    }
}

impl FromRef<Arc<PollutionApiState>> for UploadLimit {
    fn from_ref(state: &Arc<PollutionApiState>) -> Self {
        UploadLimit(state.upload_max_size)
    }
}

/// Pollution API error types
#[derive(Debug, thiserror::Error)]
pub enum PollutionApiError {
    #[error("Pollution not found")]
    NotFound,

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<PollutionRepositoryError> for PollutionApiError {
    fn from(err: PollutionRepositoryError) -> Self {
        match err {
            PollutionRepositoryError::NotFound => PollutionApiError::NotFound,
            PollutionRepositoryError::DatabaseError(e) => {
                PollutionApiError::InternalError(e.to_string())
            }
        }
    }
}

impl IntoResponse for PollutionApiError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            PollutionApiError::NotFound => (StatusCode::NOT_FOUND, "POLLUTION_NOT_FOUND"),
            PollutionApiError::Upload(ref upload) => match upload {
                UploadError::InvalidFileType => (StatusCode::BAD_REQUEST, "INVALID_FILE_TYPE"),
                UploadError::FileTooLarge { .. } => {
                    (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE")
                }
                UploadError::TooManyFiles => (StatusCode::BAD_REQUEST, "TOO_MANY_FILES"),
                UploadError::Malformed(_) => (StatusCode::BAD_REQUEST, "INVALID_UPLOAD"),
                UploadError::UnsupportedContentType => {
                    (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE")
                }
            },
            PollutionApiError::Validation(errors) => return validation_response(errors),
            PollutionApiError::Auth(err) => return err.into_response(),
            PollutionApiError::InternalError(detail) => return internal_error_response(&detail),
        };

        error_response(status, code, self.to_string())
    }
}

/// Create the pollution API router
pub fn pollution_api_router(state: PollutionApiState) -> Router {
    let body_limit = state.upload_max_size + FORM_OVERHEAD;
    let state = Arc::new(state);

    Router::new()
        .route("/api/pollutions", get(list_handler).post(create_handler))
        .route(
            "/api/pollutions/{id}",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// GET /api/pollutions
/// List pollutions with search, filters and pagination
async fn list_handler(
    State(state): State<Arc<PollutionApiState>>,
    viewer: MaybeAuthUser,
    query: Result<Query<PollutionQuery>, QueryRejection>,
) -> Result<Json<Paginated<Pollution>>, PollutionApiError> {
    let Query(query) =
        query.map_err(|rejection| ValidationErrors::single("query", rejection.body_text()))?;
    let filters = validate_filters(&query)?;

    let (rows, total) = state
        .pollution_repo
        .list(&filters, viewer.user_id())
        .await?;

    Ok(Json(Paginated::new(rows, total, filters.page, filters.limit)))
}

/// GET /api/pollutions/{id}
/// Get a single pollution
async fn get_handler(
    State(state): State<Arc<PollutionApiState>>,
    viewer: MaybeAuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Pollution>, PollutionApiError> {
    let id = path_uuid(path, "id")?;

    let pollution = state
        .pollution_repo
        .find_by_id(id, viewer.user_id())
        .await?
        .ok_or(PollutionApiError::NotFound)?;

    Ok(Json(pollution))
}

/// POST /api/pollutions
/// Report a new pollution; a signed-in caller is recorded as the discoverer
async fn create_handler(
    State(state): State<Arc<PollutionApiState>>,
    viewer: MaybeAuthUser,
    form: PollutionForm,
) -> Result<(StatusCode, Json<Pollution>), PollutionApiError> {
    let draft = validate_pollution_draft(&form.fields)?;
    let photo = form.photo.as_ref().map(|p| p.to_stored());

    let pollution = state
        .pollution_repo
        .create(&draft, photo.as_ref(), viewer.user_id())
        .await?;

    tracing::info!(
        pollution_id = %pollution.id,
        pollution_type = %pollution.pollution_type,
        has_photo = photo.is_some(),
        "Pollution reported"
    );

    Ok((StatusCode::CREATED, Json(pollution)))
}

/// PUT /api/pollutions/{id}
/// Update the given fields and optionally replace the photo
async fn update_handler(
    State(state): State<Arc<PollutionApiState>>,
    user: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    form: PollutionForm,
) -> Result<Json<Pollution>, PollutionApiError> {
    let id = path_uuid(path, "id")?;
    let patch = validate_pollution_patch(&form.fields)?;
    let photo = form.photo.as_ref().map(|p| p.to_stored());

    let pollution = state
        .pollution_repo
        .update(id, &patch, photo.as_ref(), Some(user.user_id))
        .await?
        .ok_or(PollutionApiError::NotFound)?;

    tracing::info!(pollution_id = %id, user_id = %user.user_id, "Pollution updated");

    Ok(Json(pollution))
}

/// DELETE /api/pollutions/{id}
/// Delete a pollution
async fn delete_handler(
    State(state): State<Arc<PollutionApiState>>,
    user: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, PollutionApiError> {
    let id = path_uuid(path, "id")?;

    if !state.pollution_repo.delete(id).await? {
        return Err(PollutionApiError::NotFound);
    }

    tracing::info!(pollution_id = %id, user_id = %user.user_id, "Pollution deleted");

    Ok(StatusCode::NO_CONTENT)
}
