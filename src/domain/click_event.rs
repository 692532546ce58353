//! Click fact model carried over the broker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw click fact captured at redirect time.
///
/// Immutable once created. It is serialized onto the click topic as JSON and
/// decoded again by the consumer pool.
///
/// # Wire format
///
/// `{"alias", "timestamp" (RFC 3339), "ip", "user_agent", "referer"}`.
/// Unknown fields are ignored, missing `ip`/`user_agent`/`referer` decode as
/// empty, and `referer` is omitted when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawClickFact {
    pub alias: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub referer: String,
}

impl RawClickFact {
    /// Creates a click fact stamped with the current time.
    pub fn new(
        alias: impl Into<String>,
        ip: impl Into<String>,
        user_agent: impl Into<String>,
        referer: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            timestamp: Utc::now(),
            ip: ip.into(),
            user_agent: user_agent.into(),
            referer: referer.into(),
        }
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
