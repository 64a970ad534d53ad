//! Core domain models, validation and the HTTP API

pub mod models;
pub mod validation;

#[cfg(feature = "server")]
pub mod auth;
#[cfg(feature = "server")]
pub mod config;
#[cfg(feature = "server")]
pub mod db;
#[cfg(feature = "server")]
pub mod error;
#[cfg(feature = "server")]
pub mod favorites;
#[cfg(feature = "server")]
pub mod pollutions;
#[cfg(feature = "server")]
pub mod server;

pub use models::*;
