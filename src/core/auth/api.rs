//! Auth API endpoints
//!
//! Provides REST API endpoints for authentication:
//! - POST /api/auth/register - Register a new user
//! - POST /api/auth/login - Login and get tokens
//! - POST /api/auth/refresh - Exchange a refresh token for a new pair
//! - POST /api/auth/logout - Logout (invalidate refresh token)
//! - GET /api/auth/me - Get current user info

use axum::{
    Json, Router,
    extract::{FromRef, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;

use crate::core::auth::extract::AuthUser;
use crate::core::auth::jwt::JwtService;
use crate::core::auth::service::{AuthError, AuthService};
use crate::core::error::{error_response, internal_error_response, validation_response};
use crate::core::models::{
    AuthResponse, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest, TokenPair,
    UserResponse,
};
use crate::core::validation::ValidationErrors;

/// Auth API state containing the auth service
#[derive(Clone)]
pub struct AuthApiState {
    pub auth_service: AuthService,
}

impl FromRef<Arc<AuthApiState>> for JwtService {
    fn from_ref(state: &Arc<AuthApiState>) -> Self {
        state.auth_service.jwt_service().clone()
    }
}

/// Convert AuthError to API response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            AuthError::UserNotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            AuthError::EmailAlreadyExists => (StatusCode::CONFLICT, "EMAIL_EXISTS"),
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            AuthError::SessionExpired => (StatusCode::UNAUTHORIZED, "SESSION_EXPIRED"),
            AuthError::Validation(errors) => return validation_response(errors),
            AuthError::InternalError(detail) => return internal_error_response(&detail),
        };

        error_response(status, code, self.to_string())
    }
}

/// Turn a malformed JSON body into a validation error
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ValidationErrors> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ValidationErrors::single("body", rejection.body_text()))
}

/// Create the auth API router
pub fn auth_api_router(state: AuthApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/refresh", post(refresh_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/auth/me", get(me_handler))
        .with_state(state)
}

/// POST /api/auth/register
/// Register a new user
async fn register_handler(
    State(state): State<Arc<AuthApiState>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    let request = json_body(body)?;

    let response = state.auth_service.register(request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login
/// Login and get access/refresh tokens
async fn login_handler(
    State(state): State<Arc<AuthApiState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError> {
    let request = json_body(body)?;

    let response = state.auth_service.login(request).await?;

    Ok(Json(response))
}

/// POST /api/auth/refresh
/// Rotate the token pair using the refresh token
async fn refresh_handler(
    State(state): State<Arc<AuthApiState>>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, AuthError> {
    let request = json_body(body)?;
    if request.refresh_token.is_empty() {
        return Err(ValidationErrors::single("refreshToken", "Refresh token is required").into());
    }

    let tokens = state.auth_service.refresh(&request.refresh_token).await?;

    Ok(Json(tokens))
}

/// POST /api/auth/logout
/// Logout and invalidate refresh token
async fn logout_handler(
    State(state): State<Arc<AuthApiState>>,
    user: AuthUser,
) -> Result<Json<MessageResponse>, AuthError> {
    state.auth_service.logout(user.user_id).await?;

    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// GET /api/auth/me
/// Get current user info from access token
async fn me_handler(
    State(state): State<Arc<AuthApiState>>,
    user: AuthUser,
) -> Result<Json<UserResponse>, AuthError> {
    tracing::debug!(user_id = %user.user_id, "Fetching current user");

    let user = state.auth_service.current_user(user.user_id).await?;

    Ok(Json(user))
}
