//! Request validation for account and pollution forms
//!
//! Validators collect every failing field instead of stopping at the first one,
//! so a form can highlight all problems at once. They are shared by the HTTP
//! handlers and the API client (which checks forms before sending them).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::models::{
    DEFAULT_PAGE_LIMIT, LoginRequest, MAX_PAGE, MAX_PAGE_LIMIT, PollutionDraft, PollutionFilters,
    PollutionPatch, PollutionStatus, PollutionType, RegisterRequest,
};

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const NAME_LENGTH: (usize, usize) = (2, 100);
pub const POLLUTION_NAME_LENGTH: (usize, usize) = (3, 255);
pub const DESCRIPTION_LENGTH: (usize, usize) = (10, 10_000);
pub const MAX_CITY_LENGTH: usize = 100;
pub const MAX_ADDRESS_LENGTH: usize = 500;
pub const MAX_SEARCH_LENGTH: usize = 255;

/// A single failed field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// All failed fields of a request
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("Validation failed")]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an error with a single field
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }

    /// Check whether a given field failed
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Record the error of a failed check, returning the value if it passed
    fn check<T>(&mut self, field: &str, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.push(field, message);
                None
            }
        }
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationErrors> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }
}

// ============================================================================
// Form Fields
// ============================================================================

/// Raw text fields of a submitted form
///
/// A field mapped to `None` was sent as an explicit JSON `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormFields(BTreeMap<String, Option<String>>);

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), Some(value.into()));
    }

    pub fn insert_null(&mut self, name: impl Into<String>) {
        self.0.insert(name.into(), None);
    }

    /// `None` if absent, `Some(None)` if null, `Some(Some(text))` otherwise
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.0.get(name).map(|v| v.as_deref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Convert a JSON object body into form fields
    ///
    /// Numbers and booleans are kept as their textual form so both JSON and
    /// multipart submissions go through the same validation.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ValidationErrors> {
        let serde_json::Value::Object(map) = value else {
            return Err(ValidationErrors::single("body", "Expected a JSON object"));
        };

        let mut fields = Self::new();
        for (key, value) in map {
            match value {
                serde_json::Value::Null => fields.insert_null(key),
                serde_json::Value::String(s) => fields.insert_text(key, s),
                serde_json::Value::Number(n) => fields.insert_text(key, n.to_string()),
                serde_json::Value::Bool(b) => fields.insert_text(key, b.to_string()),
                _ => {
                    return Err(ValidationErrors::single(
                        key,
                        "Nested values are not supported",
                    ));
                }
            }
        }

        Ok(fields)
    }
}

// ============================================================================
// Field Checks
// ============================================================================

/// Trim and lowercase an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Check email format: something@something.something
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }

    // Domain needs at least one dot and no empty labels
    domain.contains('.') && domain.split('.').all(|p| !p.is_empty())
}

/// Check password strength (length, lowercase, uppercase, digit)
pub fn check_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }
    Ok(())
}

fn check_length(label: &str, value: &str, (min, max): (usize, usize)) -> Result<String, String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(format!(
            "{label} must be between {min} and {max} characters"
        ));
    }
    Ok(trimmed.to_string())
}

fn check_max_length(label: &str, value: &str, max: usize) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.chars().count() > max {
        return Err(format!("{label} cannot exceed {max} characters"));
    }
    Ok(trimmed.to_string())
}

fn check_city(value: &str) -> Result<String, String> {
    let city = check_max_length("City", value, MAX_CITY_LENGTH)?;
    if city.is_empty() {
        return Err("City is required".to_string());
    }
    Ok(city)
}

fn check_coordinate(label: &str, value: &str, bound: f64) -> Result<f64, String> {
    let message = || format!("{label} must be between -{bound} and {bound}");
    let parsed: f64 = value.trim().parse().map_err(|_| message())?;
    if !parsed.is_finite() || parsed < -bound || parsed > bound {
        return Err(message());
    }
    Ok(parsed)
}

fn check_type(value: &str) -> Result<PollutionType, String> {
    value.trim().parse().map_err(|_| {
        let allowed: Vec<&str> = PollutionType::ALL.iter().map(|t| t.as_str()).collect();
        format!("Type must be one of: {}", allowed.join(", "))
    })
}

fn check_status(value: &str) -> Result<PollutionStatus, String> {
    value.trim().parse().map_err(|_| {
        let allowed: Vec<&str> = PollutionStatus::ALL.iter().map(|s| s.as_str()).collect();
        format!("Status must be one of: {}", allowed.join(", "))
    })
}

/// Parse an ISO 8601 date or date-time
///
/// Values without an offset (`2024-05-01T10:30`, `2024-05-01`) are taken as UTC.
pub fn parse_iso8601(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn check_recorded_at(value: &str) -> Result<DateTime<Utc>, String> {
    parse_iso8601(value).ok_or_else(|| "Recorded date must be an ISO 8601 date".to_string())
}

/// A nullable optional field: empty text counts as null
fn nullable<'a>(value: Option<&'a str>) -> Option<&'a str> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Account Forms
// ============================================================================

/// Validate a registration form, returning it normalized
pub fn validate_registration(request: &RegisterRequest) -> Result<RegisterRequest, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let email = normalize_email(&request.email);
    if !is_valid_email(&email) {
        errors.push("email", "Invalid email");
    }

    errors.check("password", check_password(&request.password));
    let name = errors.check("name", check_length("Name", &request.name, NAME_LENGTH));

    errors.finish(|| RegisterRequest {
        email,
        password: request.password.clone(),
        name: name.unwrap_or_default(),
    })
}

/// Validate a login form, returning it normalized
pub fn validate_login(request: &LoginRequest) -> Result<LoginRequest, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let email = normalize_email(&request.email);
    if !is_valid_email(&email) {
        errors.push("email", "Invalid email");
    }
    if request.password.is_empty() {
        errors.push("password", "Password is required");
    }

    errors.finish(|| LoginRequest {
        email,
        password: request.password.clone(),
    })
}

// ============================================================================
// Pollution Forms
// ============================================================================

/// Validate the fields of a new pollution report
pub fn validate_pollution_draft(fields: &FormFields) -> Result<PollutionDraft, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let text = |name: &str| fields.get(name).flatten().unwrap_or("");

    let name = errors.check(
        "name",
        check_length("Name", text("name"), POLLUTION_NAME_LENGTH),
    );
    let pollution_type = errors.check("type", check_type(text("type")));
    let city = errors.check("city", check_city(text("city")));
    let latitude = nullable(fields.get("latitude").flatten())
        .and_then(|v| errors.check("latitude", check_coordinate("Latitude", v, 90.0)));
    let longitude = nullable(fields.get("longitude").flatten())
        .and_then(|v| errors.check("longitude", check_coordinate("Longitude", v, 180.0)));
    let address = nullable(fields.get("address").flatten())
        .and_then(|v| errors.check("address", check_max_length("Address", v, MAX_ADDRESS_LENGTH)));
    let recorded_at = errors.check("recordedAt", check_recorded_at(text("recordedAt")));
    let description = errors.check(
        "description",
        check_length("Description", text("description"), DESCRIPTION_LENGTH),
    );
    let status = fields
        .get("status")
        .flatten()
        .and_then(|v| errors.check("status", check_status(v)));

    if !errors.is_empty() {
        return Err(errors);
    }

    match (name, pollution_type, city, recorded_at, description) {
        (Some(name), Some(pollution_type), Some(city), Some(recorded_at), Some(description)) => {
            Ok(PollutionDraft {
                name,
                pollution_type,
                city,
                latitude,
                longitude,
                address,
                recorded_at,
                description,
                status,
            })
        }
        _ => Err(errors),
    }
}

/// Validate a partial update of a pollution report
pub fn validate_pollution_patch(fields: &FormFields) -> Result<PollutionPatch, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut patch = PollutionPatch::default();

    let present = |name: &str| fields.get(name).map(|v| v.unwrap_or(""));

    if let Some(v) = present("name") {
        patch.name = errors.check("name", check_length("Name", v, POLLUTION_NAME_LENGTH));
    }
    if let Some(v) = present("type") {
        patch.pollution_type = errors.check("type", check_type(v));
    }
    if let Some(v) = present("city") {
        patch.city = errors.check("city", check_city(v));
    }
    if let Some(v) = fields.get("latitude") {
        patch.latitude = match nullable(v) {
            None => Some(None),
            Some(v) => errors
                .check("latitude", check_coordinate("Latitude", v, 90.0))
                .map(Some),
        };
    }
    if let Some(v) = fields.get("longitude") {
        patch.longitude = match nullable(v) {
            None => Some(None),
            Some(v) => errors
                .check("longitude", check_coordinate("Longitude", v, 180.0))
                .map(Some),
        };
    }
    if let Some(v) = fields.get("address") {
        patch.address = match nullable(v) {
            None => Some(None),
            Some(v) => errors
                .check("address", check_max_length("Address", v, MAX_ADDRESS_LENGTH))
                .map(Some),
        };
    }
    if let Some(v) = present("recordedAt") {
        patch.recorded_at = errors.check("recordedAt", check_recorded_at(v));
    }
    if let Some(v) = present("description") {
        patch.description = errors.check(
            "description",
            check_length("Description", v, DESCRIPTION_LENGTH),
        );
    }
    if let Some(v) = present("status") {
        patch.status = errors.check("status", check_status(v));
    }

    errors.finish(|| patch)
}

// ============================================================================
// List Filters
// ============================================================================

/// Raw query string of a pollution listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollutionQuery {
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub pollution_type: Option<String>,
    pub city: Option<String>,
    pub status: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Validate listing filters; empty `type`/`status` mean "no filter"
pub fn validate_filters(query: &PollutionQuery) -> Result<PollutionFilters, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let non_empty = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let search = non_empty(&query.search)
        .and_then(|v| errors.check("search", check_max_length("Search", &v, MAX_SEARCH_LENGTH)));
    let city = non_empty(&query.city)
        .and_then(|v| errors.check("city", check_max_length("City", &v, MAX_CITY_LENGTH)));
    let pollution_type = non_empty(&query.pollution_type)
        .and_then(|v| errors.check("type", check_type(&v)));
    let status = non_empty(&query.status).and_then(|v| errors.check("status", check_status(&v)));

    let page = match non_empty(&query.page) {
        None => Some(1),
        Some(v) => errors.check(
            "page",
            v.parse::<i64>()
                .ok()
                .filter(|p| (1..=MAX_PAGE).contains(p))
                .ok_or_else(|| format!("Page must be an integer between 1 and {MAX_PAGE}")),
        ),
    };
    let limit = match non_empty(&query.limit) {
        None => Some(DEFAULT_PAGE_LIMIT),
        Some(v) => errors.check(
            "limit",
            v.parse::<i64>()
                .ok()
                .filter(|l| (1..=MAX_PAGE_LIMIT).contains(l))
                .ok_or_else(|| format!("Limit must be between 1 and {MAX_PAGE_LIMIT}")),
        ),
    };

    errors.finish(|| PollutionFilters {
        search,
        pollution_type,
        city,
        status,
        page: page.unwrap_or(1),
        limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT),
    })
}
