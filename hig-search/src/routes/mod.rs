use std::str::FromStr;

use crate::domain::search::types::{Category, Platform};

pub(crate) mod components;
pub(crate) mod error;
pub(crate) mod search;
pub(crate) mod stats;

pub(crate) use error::ApiError;
use error::ErrorCode;

/// Parse an optional, case-insensitive platform name such as `ios`.
pub(crate) fn parse_platform(value: Option<&str>) -> Result<Option<Platform>, ApiError> {
    non_empty(value)
        .map(|value| {
            Platform::from_str(value).map_err(|_| {
                ApiError::bad_request(format!("Unknown platform: {}", value))
                    .with_code(ErrorCode::UnknownPlatform)
            })
        })
        .transpose()
}

/// Parse an optional category slug such as `getting-started`.
pub(crate) fn parse_category(value: Option<&str>) -> Result<Option<Category>, ApiError> {
    non_empty(value)
        .map(|value| {
            Category::from_str(value).map_err(|_| {
                ApiError::bad_request(format!("Unknown category: {}", value))
                    .with_code(ErrorCode::UnknownCategory)
            })
        })
        .transpose()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
