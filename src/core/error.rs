//! JSON error responses shared by every API router

use axum::{
    Json,
    extract::{Path, rejection::PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::core::models::ApiError;
use crate::core::validation::ValidationErrors;

static EXPOSE_INTERNAL_DETAILS: AtomicBool = AtomicBool::new(false);

/// Include internal error details in 500 bodies; off until the router is built
/// for a development environment
pub fn expose_internal_details(enabled: bool) {
    EXPOSE_INTERNAL_DETAILS.store(enabled, Ordering::Relaxed);
}

fn internal_message(detail: &str, expose: bool) -> String {
    if expose {
        format!("Internal server error: {detail}")
    } else {
        "Internal server error".to_string()
    }
}

/// Build an error response with the standard body
pub fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ApiError::new(message, code))).into_response()
}

/// 400 response listing every failed field
pub fn validation_response(errors: ValidationErrors) -> Response {
    let body = ApiError::new("Validation failed", "VALIDATION_ERROR").with_fields(errors.into_errors());
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// 500 response; the detail is logged and only returned in development
pub fn internal_error_response(detail: &str) -> Response {
    tracing::error!(error = %detail, "Internal error");

    let message = internal_message(detail, EXPOSE_INTERNAL_DETAILS.load(Ordering::Relaxed));
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
}

/// Parse a UUID path segment, reporting a bad value as a field error
pub fn path_uuid(
    path: Result<Path<Uuid>, PathRejection>,
    field: &str,
) -> Result<Uuid, ValidationErrors> {
    path.map(|Path(id)| id)
        .map_err(|_| ValidationErrors::single(field, "Invalid ID format"))
}

/// 404 for unknown routes
pub async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "NOT_FOUND", "Route not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_response_body() {
        let response = error_response(StatusCode::CONFLICT, "EMAIL_EXISTS", "Email already registered");
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let json = body_json(response).await;
        assert_eq!(json["code"], "EMAIL_EXISTS");
        assert_eq!(json["error"], "Email already registered");
        assert!(json.get("errors").is_none());
    }

    #[tokio::test]
    async fn test_validation_response_lists_fields() {
        let mut errors = ValidationErrors::new();
        errors.push("name", "Name is required");
        errors.push("city", "City is required");

        let response = validation_response(errors);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["errors"].as_array().unwrap().len(), 2);
        assert_eq!(json["errors"][1]["field"], "city");
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail_by_default() {
        let response = internal_error_response("password authentication failed for user admin");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert_eq!(json["error"], "Internal server error");
    }

    #[test]
    fn test_internal_message_detail_only_when_exposed() {
        assert_eq!(
            internal_message("pool timed out", true),
            "Internal server error: pool timed out"
        );
        assert_eq!(internal_message("pool timed out", false), "Internal server error");
    }

    #[tokio::test]
    async fn test_not_found_handler() {
        let response = not_found_handler().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "NOT_FOUND");
    }
}
