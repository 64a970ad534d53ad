//! Application router assembly
//!
//! Merges the auth, pollution and favorite routers, adds the health check,
//! CORS and the JSON 404 fallback.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::core::auth::{AuthApiState, AuthService, JwtService, auth_api_router};
use crate::core::config::Config;
use crate::core::db::{self, FavoriteRepository, PgPool, PollutionRepository, UserRepository};
use crate::core::error::{expose_internal_details, not_found_handler};
use crate::core::favorites::{FavoriteApiState, favorite_api_router};
use crate::core::pollutions::{PollutionApiState, pollution_api_router};

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub database: String,
}

/// Build the complete application router
pub fn build_app(config: &Config, pool: PgPool, jwt_service: JwtService) -> Router {
    expose_internal_details(config.app_env.is_development());

    let auth_state = AuthApiState {
        auth_service: AuthService::new(UserRepository::new(pool.clone()), jwt_service.clone()),
    };
    let pollution_state = PollutionApiState {
        pollution_repo: PollutionRepository::new(pool.clone()),
        jwt_service: jwt_service.clone(),
        upload_max_size: config.upload_max_size,
    };
    let favorite_state = FavoriteApiState {
        favorite_repo: FavoriteRepository::new(pool.clone()),
        jwt_service,
    };

    let health = Router::new()
        .route("/health", get(health_handler))
        .with_state(pool);

    Router::new()
        .merge(health)
        .merge(auth_api_router(auth_state))
        .merge(pollution_api_router(pollution_state))
        .merge(favorite_api_router(favorite_state))
        .fallback(not_found_handler)
        .layer(cors_layer(&config.cors_origins))
}

/// CORS for the configured frontend origins; `*` mirrors any origin
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}

/// GET /health
async fn health_handler(State(pool): State<PgPool>) -> (StatusCode, Json<HealthResponse>) {
    let (status, label, database) = match db::health_check(&pool).await {
        Ok(()) => (StatusCode::OK, "ok", "connected"),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", "disconnected")
        }
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            timestamp: Utc::now(),
            database: database.to_string(),
        }),
    )
}
