/**
 * Routes Module
 * API route handlers
 */

pub mod admin;
pub mod auth;
pub mod blog;
pub mod contact;
pub mod health;
pub mod profile;
pub mod projects;
pub mod skills;
pub mod upload;
pub mod visitor;

#[cfg(test)]
pub(crate) mod test_support;

use crate::error::ApiError;

/// Parses a numeric path id; anything else is a 400 with `message`.
pub(crate) fn parse_id(raw: &str, message: &'static str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| ApiError::validation(message))
}

/// Trims an optional string field; blank becomes `None`.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
