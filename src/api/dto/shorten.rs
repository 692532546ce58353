//! DTOs for link shortening endpoint.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use validator::Validate;

/// Compiled regex for custom alias validation.
static CUSTOM_ALIAS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").unwrap());

/// Request to shorten a URL.
#[derive(Debug, Deserialize, Validate)]
pub struct ShortenRequest {
    /// The original URL to shorten (must be valid HTTP/HTTPS).
    #[validate(url(message = "Invalid URL format"))]
    pub original_url: String,

    /// Optional custom alias; a random one is generated otherwise.
    #[validate(length(min = 3, max = 100))]
    #[validate(regex(path = "*CUSTOM_ALIAS_REGEX", message = "Alias must be alphanumeric"))]
    pub custom_alias: Option<String>,

    /// Optional lifetime in seconds, at most ten years.
    #[validate(range(min = 1, max = 315_360_000))]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub short_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}
