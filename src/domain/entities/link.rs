//! Link entity representing a shortened URL mapping.

use chrono::{DateTime, Utc};

/// A short alias mapped to its destination URL.
///
/// `click_count` is maintained by the store with an atomic increment and is
/// never written back from application code.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Link {
    pub alias: String,
    pub original_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub click_count: i64,
}

impl Link {
    /// Creates a new Link instance.
    pub fn new(
        alias: String,
        original_url: String,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
        click_count: i64,
    ) -> Self {
        Self {
            alias,
            original_url,
            created_at,
            expires_at,
            click_count,
        }
    }

    /// Returns true if the link has passed its expiry time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|e| now >= e)
    }
}

/// Input data for creating a new link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub alias: String,
    pub original_url: String,
    pub expires_at: Option<DateTime<Utc>>,
}
