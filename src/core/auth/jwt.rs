//! JWT utilities for token generation and validation
//!
//! Provides JWT token creation and validation using HS256 algorithm.
//! Access tokens are short-lived (15 minutes), refresh tokens are long-lived (7 days).
//! Each kind is signed with its own secret.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::models::TokenPair;

/// Default access token expiration time (15 minutes)
const ACCESS_TOKEN_EXPIRATION_MINUTES: i64 = 15;

/// Default refresh token expiration time (7 days)
const REFRESH_TOKEN_EXPIRATION_DAYS: i64 = 7;

const DEFAULT_ISSUER: &str = "ecowatch";

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing access tokens
    pub access_secret: String,
    /// Secret key for signing refresh tokens
    pub refresh_secret: String,
    /// Access token expiration in minutes
    pub access_token_expiration_minutes: i64,
    /// Refresh token expiration in days
    pub refresh_token_expiration_days: i64,
    /// Token issuer
    pub issuer: String,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field(
                "access_token_expiration_minutes",
                &self.access_token_expiration_minutes,
            )
            .field(
                "refresh_token_expiration_days",
                &self.refresh_token_expiration_days,
            )
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl JwtConfig {
    /// Create a new JWT configuration
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_token_expiration_minutes: ACCESS_TOKEN_EXPIRATION_MINUTES,
            refresh_token_expiration_days: REFRESH_TOKEN_EXPIRATION_DAYS,
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    /// Create config from environment variables
    pub fn from_env() -> Result<Self, JwtError> {
        let access_secret = std::env::var("JWT_ACCESS_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(JwtError::MissingSecret("JWT_ACCESS_SECRET"))?;
        let refresh_secret = std::env::var("JWT_REFRESH_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(JwtError::MissingSecret("JWT_REFRESH_SECRET"))?;

        if access_secret == refresh_secret {
            return Err(JwtError::SharedSecret);
        }

        let access_exp = std::env::var("JWT_ACCESS_EXPIRATION_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(ACCESS_TOKEN_EXPIRATION_MINUTES);

        let refresh_exp = std::env::var("JWT_REFRESH_EXPIRATION_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(REFRESH_TOKEN_EXPIRATION_DAYS);

        let issuer = std::env::var("JWT_ISSUER").unwrap_or_else(|_| DEFAULT_ISSUER.to_string());

        Ok(Self {
            access_secret,
            refresh_secret,
            access_token_expiration_minutes: access_exp,
            refresh_token_expiration_days: refresh_exp,
            issuer,
        })
    }

    /// Set access token expiration
    pub fn access_token_expiration(mut self, minutes: i64) -> Self {
        self.access_token_expiration_minutes = minutes;
        self
    }

    /// Set refresh token expiration
    pub fn refresh_token_expiration(mut self, days: i64) -> Self {
        self.refresh_token_expiration_days = days;
        self
    }

    /// Set issuer
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

/// JWT errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("{0} environment variable not set")]
    MissingSecret(&'static str),

    #[error("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ")]
    SharedSecret,

    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token decoding failed: {0}")]
    DecodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid token type")]
    InvalidTokenType,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidIssuer
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => JwtError::InvalidToken,
            _ => JwtError::DecodingError(err.to_string()),
        }
    }
}

/// Token type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User email (access tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Token type (access or refresh)
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

impl Claims {
    /// Check if this is an access token
    pub fn is_access_token(&self) -> bool {
        self.token_type == TokenType::Access
    }

    /// Check if this is a refresh token
    pub fn is_refresh_token(&self) -> bool {
        self.token_type == TokenType::Refresh
    }

    /// Get user ID as UUID
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidToken)
    }
}

/// JWT service for token operations
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    access_encoding_key: EncodingKey,
    access_decoding_key: DecodingKey,
    refresh_encoding_key: EncodingKey,
    refresh_decoding_key: DecodingKey,
}

impl JwtService {
    /// Create a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let access = config.access_secret.as_bytes();
        let refresh = config.refresh_secret.as_bytes();

        Self {
            access_encoding_key: EncodingKey::from_secret(access),
            access_decoding_key: DecodingKey::from_secret(access),
            refresh_encoding_key: EncodingKey::from_secret(refresh),
            refresh_decoding_key: DecodingKey::from_secret(refresh),
            config,
        }
    }

    /// Create JWT service from environment variables
    pub fn from_env() -> Result<Self, JwtError> {
        let config = JwtConfig::from_env()?;
        Ok(Self::new(config))
    }

    fn sign(&self, claims: &Claims, key: &EncodingKey) -> Result<String, JwtError> {
        encode(&Header::default(), claims, key).map_err(|e| JwtError::EncodingError(e.to_string()))
    }

    /// Generate an access token
    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<(String, i64), JwtError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.config.access_token_expiration_minutes);

        let claims = Claims {
            sub: user_id.to_string(),
            email: Some(email.to_string()),
            token_type: TokenType::Access,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = self.sign(&claims, &self.access_encoding_key)?;
        Ok((token, exp.timestamp()))
    }

    /// Generate a refresh token
    pub fn generate_refresh_token(&self, user_id: Uuid) -> Result<(String, i64), JwtError> {
        let now = Utc::now();
        let exp = now + Duration::days(self.config.refresh_token_expiration_days);

        let claims = Claims {
            sub: user_id.to_string(),
            email: None,
            token_type: TokenType::Refresh,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = self.sign(&claims, &self.refresh_encoding_key)?;
        Ok((token, exp.timestamp()))
    }

    /// Generate both access and refresh tokens
    pub fn generate_token_pair(&self, user_id: Uuid, email: &str) -> Result<TokenPair, JwtError> {
        let (access_token, access_expires_at) = self.generate_access_token(user_id, email)?;
        let (refresh_token, refresh_expires_at) = self.generate_refresh_token(user_id)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
            token_type: "Bearer".to_string(),
        })
    }

    fn validate(&self, token: &str, key: &DecodingKey) -> Result<Claims, JwtError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);
        // Set leeway to 0 for strict expiration checking
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, key, &validation)?;

        Ok(token_data.claims)
    }

    /// Validate an access token specifically
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate(token, &self.access_decoding_key)?;

        if !claims.is_access_token() {
            return Err(JwtError::InvalidTokenType);
        }

        Ok(claims)
    }

    /// Validate a refresh token specifically
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate(token, &self.refresh_decoding_key)?;

        if !claims.is_refresh_token() {
            return Err(JwtError::InvalidTokenType);
        }

        Ok(claims)
    }

    /// Get the access token expiration in minutes
    pub fn access_token_expiration_minutes(&self) -> i64 {
        self.config.access_token_expiration_minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_SECRET: &str = "test_access_secret_for_testing_only_32b!";
    const REFRESH_SECRET: &str = "test_refresh_secret_for_testing_only_32!";

    fn create_test_service() -> JwtService {
        JwtService::new(JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET))
    }

    // ========================================================================
    // JwtConfig Tests
    // ========================================================================

    #[test]
    fn test_jwt_config_new() {
        let config = JwtConfig::new("a", "r");

        assert_eq!(config.access_secret, "a");
        assert_eq!(config.refresh_secret, "r");
        assert_eq!(config.access_token_expiration_minutes, 15);
        assert_eq!(config.refresh_token_expiration_days, 7);
        assert_eq!(config.issuer, "ecowatch");
    }

    #[test]
    fn test_jwt_config_builder() {
        let config = JwtConfig::new("a", "r")
            .access_token_expiration(30)
            .refresh_token_expiration(14)
            .issuer("my_app");

        assert_eq!(config.access_token_expiration_minutes, 30);
        assert_eq!(config.refresh_token_expiration_days, 14);
        assert_eq!(config.issuer, "my_app");
    }

    #[test]
    fn test_jwt_config_debug_redacts_secrets() {
        let debug = format!("{:?}", JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET));
        assert!(!debug.contains(ACCESS_SECRET));
        assert!(!debug.contains(REFRESH_SECRET));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_jwt_config_from_env() {
        let vars = ["JWT_ACCESS_SECRET", "JWT_REFRESH_SECRET"];
        let original: Vec<Option<String>> = vars.iter().map(|v| std::env::var(v).ok()).collect();

        // SAFETY: test environment
        unsafe {
            std::env::remove_var("JWT_ACCESS_SECRET");
            std::env::remove_var("JWT_REFRESH_SECRET");
        }
        assert!(matches!(
            JwtConfig::from_env(),
            Err(JwtError::MissingSecret("JWT_ACCESS_SECRET"))
        ));

        // SAFETY: test environment
        unsafe {
            std::env::set_var("JWT_ACCESS_SECRET", "same");
            std::env::set_var("JWT_REFRESH_SECRET", "same");
        }
        assert!(matches!(JwtConfig::from_env(), Err(JwtError::SharedSecret)));

        // SAFETY: test environment
        unsafe { std::env::set_var("JWT_REFRESH_SECRET", "different") };
        let config = JwtConfig::from_env().unwrap();
        assert_eq!(config.access_secret, "same");
        assert_eq!(config.refresh_secret, "different");

        for (name, value) in vars.iter().zip(original) {
            // SAFETY: test environment
            unsafe {
                match value {
                    Some(v) => std::env::set_var(name, v),
                    None => std::env::remove_var(name),
                }
            }
        }
    }

    // ========================================================================
    // Token Type Tests
    // ========================================================================

    #[test]
    fn test_token_type_serialization() {
        assert_eq!(
            serde_json::to_string(&TokenType::Access).unwrap(),
            "\"access\""
        );
        assert_eq!(TokenType::Refresh.to_string(), "refresh");
    }

    // ========================================================================
    // Token Generation Tests
    // ========================================================================

    #[test]
    fn test_generate_access_token() {
        let service = create_test_service();
        let user_id = Uuid::new_v4();

        let (token, exp) = service
            .generate_access_token(user_id, "alice@example.org")
            .unwrap();

        assert_eq!(token.split('.').count(), 3);
        let expected = Utc::now().timestamp() + 15 * 60;
        assert!((exp - expected).abs() <= 2);

        let claims = service.validate_access_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.email.as_deref(), Some("alice@example.org"));
        assert_eq!(claims.iss, "ecowatch");
    }

    #[test]
    fn test_generate_refresh_token_has_no_email() {
        let service = create_test_service();
        let user_id = Uuid::new_v4();

        let (token, exp) = service.generate_refresh_token(user_id).unwrap();
        let expected = Utc::now().timestamp() + 7 * 24 * 3600;
        assert!((exp - expected).abs() <= 2);

        let claims = service.validate_refresh_token(&token).unwrap();
        assert!(claims.is_refresh_token());
        assert!(claims.email.is_none());
        assert_eq!(claims.user_id().unwrap(), user_id);
    }

    #[test]
    fn test_token_pair() {
        let service = create_test_service();
        let pair = service
            .generate_token_pair(Uuid::new_v4(), "bob@example.org")
            .unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_ne!(pair.access_token, pair.refresh_token);
        assert!(pair.refresh_expires_at > pair.access_expires_at);
    }

    #[test]
    fn test_tokens_are_unique() {
        let service = create_test_service();
        let user_id = Uuid::new_v4();

        let (a, _) = service.generate_refresh_token(user_id).unwrap();
        let (b, _) = service.generate_refresh_token(user_id).unwrap();
        assert_ne!(a, b);
    }

    // ========================================================================
    // Token Validation Tests
    // ========================================================================

    #[test]
    fn test_access_token_rejected_as_refresh() {
        let service = create_test_service();
        let (access, _) = service
            .generate_access_token(Uuid::new_v4(), "a@b.co")
            .unwrap();

        assert!(matches!(
            service.validate_refresh_token(&access),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let service = create_test_service();
        let (refresh, _) = service.generate_refresh_token(Uuid::new_v4()).unwrap();

        assert!(matches!(
            service.validate_access_token(&refresh),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn test_token_type_checked_even_with_shared_secret() {
        let service = JwtService::new(JwtConfig::new("shared", "shared"));
        let (refresh, _) = service.generate_refresh_token(Uuid::new_v4()).unwrap();

        assert!(matches!(
            service.validate_access_token(&refresh),
            Err(JwtError::InvalidTokenType)
        ));
    }

    #[test]
    fn test_expired_token() {
        let service = JwtService::new(
            JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET).access_token_expiration(-1),
        );
        let (token, _) = service
            .generate_access_token(Uuid::new_v4(), "a@b.co")
            .unwrap();

        assert!(matches!(
            service.validate_access_token(&token),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_wrong_issuer() {
        let issuer_a = JwtService::new(JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET).issuer("a"));
        let issuer_b = JwtService::new(JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET).issuer("b"));

        let (token, _) = issuer_a
            .generate_access_token(Uuid::new_v4(), "a@b.co")
            .unwrap();
        assert!(issuer_b.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_garbage_token() {
        let service = create_test_service();

        assert!(matches!(
            service.validate_access_token("not.a.jwt"),
            Err(JwtError::InvalidToken)
        ));
        assert!(service.validate_access_token("").is_err());
    }

    #[test]
    fn test_invalid_subject() {
        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            email: None,
            token_type: TokenType::Access,
            iat: 0,
            exp: 0,
            iss: "ecowatch".to_string(),
            jti: "x".to_string(),
        };
        assert!(matches!(claims.user_id(), Err(JwtError::InvalidToken)));
    }
}
