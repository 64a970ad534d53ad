//! Application configuration from environment variables.
//!
//! Load configuration using `Config::from_env()` after calling `dotenvy::dotenv()`.

use std::net::SocketAddr;

/// Default maximum photo upload size (5 MB)
pub const DEFAULT_UPLOAD_MAX_SIZE: usize = 5 * 1024 * 1024;

/// Default allowed CORS origin (local frontend dev server)
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:4200";

/// Deployment environment
///
/// Only an explicit `development` turns on development behaviour; an unset or
/// unknown `APP_ENV` is `Unspecified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    Development,
    Production,
    Test,
    #[default]
    Unspecified,
}

impl AppEnv {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" => AppEnv::Development,
            "production" | "prod" => AppEnv::Production,
            "test" => AppEnv::Test,
            _ => AppEnv::Unspecified,
        }
    }

    /// Read `APP_ENV` from the process environment
    pub fn from_env() -> Self {
        std::env::var("APP_ENV")
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    pub fn is_production(&self) -> bool {
        *self == AppEnv::Production
    }

    pub fn is_development(&self) -> bool {
        *self == AppEnv::Development
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface to bind (`HOST`)
    pub host: String,
    /// Port to listen on (`PORT`)
    pub port: u16,
    /// Allowed CORS origins (`CORS_ORIGIN`, comma separated)
    pub cors_origins: Vec<String>,
    /// Maximum photo size in bytes (`UPLOAD_MAX_SIZE`)
    pub upload_max_size: usize,
    /// Deployment environment (`APP_ENV`)
    pub app_env: AppEnv,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
            upload_max_size: DEFAULT_UPLOAD_MAX_SIZE,
            app_env: AppEnv::Unspecified,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` before this to load from `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = lookup("HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(defaults.host);

        let port = match lookup("PORT") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value,
            })?,
            None => defaults.port,
        };

        let cors_origins = match lookup("CORS_ORIGIN") {
            Some(value) => {
                let origins: Vec<String> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect();
                if origins.is_empty() {
                    defaults.cors_origins
                } else {
                    origins
                }
            }
            None => defaults.cors_origins,
        };

        let upload_max_size = match lookup("UPLOAD_MAX_SIZE") {
            Some(value) => value
                .trim()
                .parse()
                .ok()
                .filter(|size: &usize| *size > 0)
                .ok_or(ConfigError::InvalidValue {
                    name: "UPLOAD_MAX_SIZE",
                    value,
                })?,
            None => defaults.upload_max_size,
        };

        let app_env = lookup("APP_ENV")
            .map(|v| AppEnv::parse(&v))
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            cors_origins,
            upload_max_size,
            app_env,
        })
    }

    /// Address the server binds to
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(format!("{}:{}", self.host, self.port)))
    }
}
