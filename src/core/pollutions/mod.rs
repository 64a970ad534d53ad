//! Pollution reports
//!
//! REST endpoints plus the form extractor shared by create and update.

pub mod api;
pub mod form;

pub use api::{PollutionApiError, PollutionApiState, pollution_api_router};
pub use form::{PhotoUpload, PollutionForm, UploadError, UploadLimit};
