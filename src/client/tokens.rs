//! In-memory token storage for the API client

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use serde::Deserialize;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::core::models::TokenPair;

/// Seconds before expiry at which an access token is treated as expired
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Claims read from a token payload without checking the signature
#[derive(Debug, Deserialize)]
struct UnverifiedClaims {
    sub: Option<String>,
    exp: Option<i64>,
}

fn decode_unverified(token: &str) -> Option<UnverifiedClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[derive(Debug, Default, Clone)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

/// Access and refresh tokens of the current session
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: RwLock<Tokens>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tokens> {
        self.tokens.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tokens> {
        self.tokens.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a freshly issued pair
    pub fn set_tokens(&self, pair: &TokenPair) {
        let mut tokens = self.write();
        tokens.access = Some(pair.access_token.clone());
        tokens.refresh = Some(pair.refresh_token.clone());
    }

    pub fn set_access_token(&self, token: impl Into<String>) {
        self.write().access = Some(token.into());
    }

    pub fn clear(&self) {
        *self.write() = Tokens::default();
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh.clone()
    }

    /// True when both tokens are present
    pub fn has_tokens(&self) -> bool {
        let tokens = self.read();
        tokens.access.is_some() && tokens.refresh.is_some()
    }

    /// Whether the access token is missing, unreadable, or expires within
    /// [`EXPIRY_MARGIN_SECS`]
    pub fn is_access_token_expired(&self) -> bool {
        let Some(token) = self.access_token() else {
            return true;
        };

        match decode_unverified(&token).and_then(|c| c.exp) {
            Some(exp) => exp - EXPIRY_MARGIN_SECS <= Utc::now().timestamp(),
            None => true,
        }
    }

    /// User ID carried by the access token
    pub fn user_id(&self) -> Option<Uuid> {
        let token = self.access_token()?;
        decode_unverified(&token)?.sub?.parse().ok()
    }
}
