//! Typed client for the EcoWatch API
//!
//! - [`TokenStore`]: in-memory access/refresh tokens
//! - [`ApiClient`]: REST calls with bearer auth and a single transparent
//!   retry after refreshing an expired access token
//! - [`AuthStore`]: observable authentication state for a UI

pub mod api;
pub mod store;
pub mod tokens;

pub use api::{ApiClient, PhotoFile, SessionListener};
pub use store::{AuthState, AuthStore};
pub use tokens::TokenStore;

use crate::core::validation::{FieldError, ValidationErrors};

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error body returned by the server
    #[error("{message}")]
    Api {
        status: u16,
        code: String,
        message: String,
        errors: Vec<FieldError>,
    },

    /// Rejected locally before any request was sent
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session expired, please log in again")]
    SessionExpired,
}

impl ClientError {
    /// Machine-readable error code, when the server sent one
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            ClientError::Validation(_) => Some("VALIDATION_ERROR"),
            ClientError::SessionExpired => Some("SESSION_EXPIRED"),
            ClientError::Http(_) | ClientError::Serialization(_) => None,
        }
    }

    /// HTTP status of a server error
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
