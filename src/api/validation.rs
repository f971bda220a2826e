//! Input validation for path, query and body parameters.
//!
//! Parsers return `ApiError` so handlers can use `?` directly.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::ApiError;
use crate::db::parse_timestamp;

/// Validate a pickup point id
pub fn parse_pvz_id(value: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value.trim()).map_err(|_| ApiError::bad_request("invalid pvz id"))
}

/// Validate an optional RFC 3339 timestamp; blank counts as absent
pub fn parse_timestamp_param(
    value: Option<&str>,
    message: &str,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_timestamp(raw)
            .map(Some)
            .map_err(|_| ApiError::bad_request(message)),
    }
}

/// Validate an optional integer; range coercion happens in the catalog
pub fn parse_int_param(value: Option<&str>, message: &str) -> Result<Option<i64>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ApiError::bad_request(message)),
    }
}
