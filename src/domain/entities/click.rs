//! Enriched click record produced by the consumer pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse device class derived from the user agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Desktop,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Desktop => "desktop",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analytics row written once per successfully processed click.
///
/// Records are append-only: the sink never updates or deduplicates them, so a
/// redelivered message may produce a second row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedClickRecord {
    pub alias: String,
    pub ip: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub device: DeviceClass,
    pub os: String,
    pub browser: String,
    pub referer: Option<String>,
    pub timestamp: DateTime<Utc>,
}
