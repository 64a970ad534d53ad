//! Authentication module for EcoWatch
//!
//! This module provides authentication functionality including:
//! - JWT access/refresh token generation and validation
//! - User registration and login
//! - Refresh token rotation
//! - Bearer token extractors for protected routes
//! - REST API endpoints for auth operations

pub mod api;
pub mod extract;
pub mod jwt;
pub mod service;

pub use api::{AuthApiState, auth_api_router};
pub use extract::{AuthUser, MaybeAuthUser};
pub use jwt::{Claims, JwtConfig, JwtError, JwtService, TokenType};
pub use service::{AuthError, AuthService};
