//! Domain models shared by the HTTP server and the API client
//!
//! These types are the wire contract of the REST API. Field names are
//! serialized in camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::validation::FieldError;

// ============================================================================
// Users & Authentication
// ============================================================================

/// User without sensitive data (for API responses)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Token pair (access + refresh)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Access token (short-lived)
    pub access_token: String,
    /// Refresh token (long-lived)
    pub refresh_token: String,
    /// Access token expiration (Unix timestamp)
    pub access_expires_at: i64,
    /// Refresh token expiration (Unix timestamp)
    pub refresh_expires_at: i64,
    /// Token type (always "Bearer")
    pub token_type: String,
}

/// Registration request data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Login request data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Authentication response with user data and tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

/// Plain message response (logout, favorite added, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// API error response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    /// Per-field details, only present for validation failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            errors: None,
        }
    }

    pub fn with_fields(mut self, errors: Vec<FieldError>) -> Self {
        self.errors = Some(errors);
        self
    }
}

// ============================================================================
// Pollution Model
// ============================================================================

/// Error returned when parsing an unknown enum value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Category of a reported pollution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollutionType {
    Plastic,
    Chemical,
    WildDumping,
    Water,
    Air,
    Other,
}

impl PollutionType {
    pub const ALL: [PollutionType; 6] = [
        PollutionType::Plastic,
        PollutionType::Chemical,
        PollutionType::WildDumping,
        PollutionType::Water,
        PollutionType::Air,
        PollutionType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PollutionType::Plastic => "plastic",
            PollutionType::Chemical => "chemical",
            PollutionType::WildDumping => "wild_dumping",
            PollutionType::Water => "water",
            PollutionType::Air => "air",
            PollutionType::Other => "other",
        }
    }
}

impl std::fmt::Display for PollutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PollutionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PollutionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "pollution type",
                value: s.to_string(),
            })
    }
}

/// Processing status of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PollutionStatus {
    #[default]
    Open,
    Investigating,
    Resolved,
}

impl PollutionStatus {
    pub const ALL: [PollutionStatus; 3] = [
        PollutionStatus::Open,
        PollutionStatus::Investigating,
        PollutionStatus::Resolved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PollutionStatus::Open => "open",
            PollutionStatus::Investigating => "investigating",
            PollutionStatus::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for PollutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PollutionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PollutionStatus::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "pollution status",
                value: s.to_string(),
            })
    }
}

/// Both enums live in TEXT columns guarded by CHECK constraints.
#[cfg(feature = "server")]
macro_rules! text_column {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <&str as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $ty {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let raw = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
                Ok(raw.parse()?)
            }
        }
    };
}

#[cfg(feature = "server")]
text_column!(PollutionType);
#[cfg(feature = "server")]
text_column!(PollutionStatus);

/// Pollution report as returned by the API, with discoverer and favorite info
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Pollution {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    #[cfg_attr(feature = "server", sqlx(rename = "type"))]
    pub pollution_type: PollutionType,
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub description: String,
    pub status: PollutionStatus,
    /// Base64-encoded photo bytes
    pub photo_data: Option<String>,
    pub photo_mime_type: Option<String>,
    pub discoverer_id: Option<Uuid>,
    pub discoverer_name: Option<String>,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated data for a new pollution report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollutionDraft {
    pub name: String,
    #[serde(rename = "type")]
    pub pollution_type: PollutionType,
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub description: String,
    pub status: Option<PollutionStatus>,
}

/// Partial update of a pollution report
///
/// For nullable columns: `None` = don't update, `Some(None)` = set to null.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PollutionPatch {
    pub name: Option<String>,
    pub pollution_type: Option<PollutionType>,
    pub city: Option<String>,
    pub latitude: Option<Option<f64>>,
    pub longitude: Option<Option<f64>>,
    pub address: Option<Option<String>>,
    pub recorded_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub status: Option<PollutionStatus>,
}

impl PollutionPatch {
    pub fn is_empty(&self) -> bool {
        *self == PollutionPatch::default()
    }
}

/// Typed list filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutionFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub pollution_type: Option<PollutionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PollutionStatus>,
    pub page: i64,
    pub limit: i64,
}

/// Default page size for listings
pub const DEFAULT_PAGE_LIMIT: i64 = 20;

/// Maximum page size for listings
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Highest page number whose offset fits in an `i64` at any page size
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_LIMIT;

impl Default for PollutionFilters {
    fn default() -> Self {
        Self {
            search: None,
            pollution_type: None,
            city: None,
            status: None,
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl PollutionFilters {
    /// Row offset of the requested page
    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).max(0).saturating_mul(self.limit)
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };

        Self {
            data,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

/// Favorite membership for one pollution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteStatus {
    pub is_favorite: bool,
}
