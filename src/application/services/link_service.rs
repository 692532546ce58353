//! Link creation, resolution and click counting.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::warn;
use url::Url;

use crate::domain::entities::{Link, NewLink};
use crate::domain::repositories::LinkStore;
use crate::error::AppError;
use crate::utils::code_generator::{GENERATED_ALIAS_LENGTH, generate_alias, validate_custom_alias};

/// Longest accepted link lifetime (ten years).
pub const MAX_EXPIRES_IN_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Service for creating and resolving short links.
pub struct LinkService {
    link_store: Arc<dyn LinkStore>,
    base_url: String,
}

impl LinkService {
    /// Creates a new link service. `base_url` prefixes every short URL.
    pub fn new(link_store: Arc<dyn LinkStore>, base_url: impl Into<String>) -> Self {
        Self {
            link_store,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Creates a short link.
    ///
    /// # Arguments
    ///
    /// - `original_url` - Absolute http(s) URL to redirect to
    /// - `custom_alias` - Optional alias (validated if provided)
    /// - `expires_in` - Optional lifetime in seconds
    ///
    /// # Alias Generation
    ///
    /// Without a custom alias a random 6-character alias is generated,
    /// retrying up to 10 times on collision.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the URL, alias or lifetime is
    /// invalid. Returns [`AppError::Conflict`] if the custom alias already
    /// exists.
    pub async fn create_short_link(
        &self,
        original_url: String,
        custom_alias: Option<String>,
        expires_in: Option<i64>,
    ) -> Result<Link, AppError> {
        validate_url(&original_url)?;

        let expires_at = match expires_in {
            None => None,
            Some(secs) if (1..=MAX_EXPIRES_IN_SECS).contains(&secs) => {
                Some(expiry_after(secs)?)
            }
            Some(secs) => {
                return Err(AppError::validation(
                    "expires_in must be between 1 second and 10 years",
                    json!({ "expires_in": secs, "max": MAX_EXPIRES_IN_SECS }),
                ));
            }
        };

        let alias = match custom_alias.filter(|a| !a.is_empty()) {
            Some(custom) => {
                validate_custom_alias(&custom)?;

                if self.link_store.find_by_alias(&custom).await?.is_some() {
                    return Err(AppError::conflict(
                        "Alias already in use",
                        json!({ "alias": custom }),
                    ));
                }

                custom
            }
            None => self.generate_unique_alias().await?,
        };

        self.link_store
            .create(NewLink {
                alias,
                original_url,
                expires_at,
            })
            .await
    }

    /// Returns the link behind `alias` if it exists and has not expired.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown or expired aliases.
    pub async fn resolve(&self, alias: &str) -> Result<Link, AppError> {
        match self.link_store.find_by_alias(alias).await? {
            Some(link) if !link.is_expired() => Ok(link),
            _ => Err(AppError::not_found(
                "Short link not found",
                json!({ "alias": alias }),
            )),
        }
    }

    /// Counts one click. Failures are logged and never surface to the caller.
    pub async fn record_click(&self, alias: &str) {
        if let Err(e) = self.link_store.increment_clicks(alias).await {
            warn!(alias, error = %e, "Failed to increment click count");
        }
    }

    /// Builds the public short URL for an alias.
    pub fn short_url(&self, alias: &str) -> String {
        format!("{}/{}", self.base_url, alias)
    }

    pub async fn ping(&self) -> bool {
        self.link_store.ping().await
    }

    async fn generate_unique_alias(&self) -> Result<String, AppError> {
        const MAX_ATTEMPTS: usize = 10;

        for _ in 0..MAX_ATTEMPTS {
            let alias = generate_alias(GENERATED_ALIAS_LENGTH);

            if self.link_store.find_by_alias(&alias).await?.is_none() {
                return Ok(alias);
            }
        }

        Err(AppError::internal(
            "Failed to generate unique alias",
            json!({ "reason": "Too many collisions" }),
        ))
    }
}

fn expiry_after(secs: i64) -> Result<DateTime<Utc>, AppError> {
    Duration::try_seconds(secs)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| {
            AppError::validation(
                "expires_in is out of range",
                json!({ "expires_in": secs }),
            )
        })
}

fn validate_url(raw: &str) -> Result<(), AppError> {
    let parsed = Url::parse(raw).map_err(|e| {
        AppError::validation(
            "Invalid URL format",
            json!({ "original_url": raw, "reason": e.to_string() }),
        )
    })?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(AppError::validation(
            "Only absolute http and https URLs are supported",
            json!({ "original_url": raw }),
        ));
    }

    Ok(())
}
