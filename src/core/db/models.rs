//! Database models for EcoWatch
//!
//! This module defines the database entity structs that map to PostgreSQL tables.
//! API-facing views of pollutions live in `core::models`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::models::UserResponse;

// ============================================================================
// User Model
// ============================================================================

/// User entity representing a registered user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    /// SHA-256 of the currently valid refresh token
    #[serde(skip_serializing)]
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// ============================================================================
// Photo Model
// ============================================================================

/// Photo as stored in a pollution row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPhoto {
    /// Base64-encoded image bytes
    pub data: String,
    pub mime_type: String,
}

// ============================================================================
// Favorite Model
// ============================================================================

/// Favorite entity linking a user to a pollution
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pollution_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "alice@example.org".to_string(),
            password_hash: "$2b$12$hash".to_string(),
            name: "Alice".to_string(),
            refresh_token_hash: Some("abc123".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_user_serialization_hides_secrets() {
        let json = serde_json::to_string(&sample_user()).unwrap();

        assert!(!json.contains("password_hash"));
        assert!(!json.contains("$2b$12$hash"));
        assert!(!json.contains("refresh_token_hash"));
        assert!(json.contains("alice@example.org"));
    }

    #[test]
    fn test_user_to_response() {
        let user = sample_user();
        let id = user.id;
        let response = UserResponse::from(user);

        assert_eq!(response.id, id);
        assert_eq!(response.name, "Alice");
        assert_eq!(response.email, "alice@example.org");
    }
}
