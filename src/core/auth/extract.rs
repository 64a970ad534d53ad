//! Request extractors for bearer-token authentication
//!
//! `AuthUser` rejects requests without a valid access token. `MaybeAuthUser`
//! never rejects: any problem with the token makes the request anonymous.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use uuid::Uuid;

use crate::core::auth::jwt::JwtService;
use crate::core::auth::service::AuthError;

/// Caller identified by a valid access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
}

impl<S> FromRequestParts<S> for AuthUser
where
    JwtService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|rejection| {
                    if rejection.is_missing() {
                        AuthError::Unauthorized
                    } else {
                        AuthError::InvalidToken
                    }
                })?;

        let jwt_service = JwtService::from_ref(state);
        let claims = jwt_service.validate_access_token(bearer.token())?;

        Ok(AuthUser {
            user_id: claims.user_id()?,
            email: claims.email,
        })
    }
}

/// Caller if a valid access token was sent, anonymous otherwise
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    pub fn user_id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|u| u.user_id)
    }
}

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    JwtService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await;
        if let Err(e) = &user {
            tracing::debug!(error = %e, "Proceeding anonymously");
        }
        Ok(MaybeAuthUser(user.ok()))
    }
}
