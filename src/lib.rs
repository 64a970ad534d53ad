//! EcoWatch - Environmental Pollution Reporting
//!
//! Citizens report pollutions (with an optional photo), browse and filter
//! reports, and keep a list of favorites. The `server` feature provides the
//! HTTP API backed by PostgreSQL; the `client` feature provides a typed API
//! client with session handling.

pub mod core;

#[cfg(feature = "client")]
pub mod client;
