//! Aggregated click statistics for a single alias.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Histogram key used when a dimension could not be determined.
pub const UNKNOWN: &str = "unknown";

/// The per-row dimensions the aggregation looks at.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ClickDimensions {
    pub ip: String,
    pub country: Option<String>,
    pub device: String,
    pub browser: String,
}

/// Statistics recomputed from every stored click of an alias.
///
/// Each histogram sums to `total_clicks`: rows with a missing value are
/// counted under [`UNKNOWN`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedStats {
    pub alias: String,
    pub total_clicks: i64,
    pub unique_ips: i64,
    pub by_country: BTreeMap<String, i64>,
    pub by_device: BTreeMap<String, i64>,
    pub by_browser: BTreeMap<String, i64>,
}

impl AggregatedStats {
    /// Zero-valued aggregate for an alias without clicks.
    pub fn empty(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            total_clicks: 0,
            unique_ips: 0,
            by_country: BTreeMap::new(),
            by_device: BTreeMap::new(),
            by_browser: BTreeMap::new(),
        }
    }

    /// Folds stored rows into an aggregate.
    pub fn from_rows<I>(alias: impl Into<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = ClickDimensions>,
    {
        let mut stats = Self::empty(alias);
        let mut ips = HashSet::new();

        for row in rows {
            stats.total_clicks += 1;

            if !row.ip.is_empty() {
                ips.insert(row.ip);
            }

            bump(&mut stats.by_country, row.country.as_deref());
            bump(&mut stats.by_device, Some(&row.device));
            bump(&mut stats.by_browser, Some(&row.browser));
        }

        stats.unique_ips = ips.len() as i64;
        stats
    }
}

fn bump(histogram: &mut BTreeMap<String, i64>, key: Option<&str>) {
    let key = match key {
        Some(k) if !k.trim().is_empty() => k,
        _ => UNKNOWN,
    };
    *histogram.entry(key.to_string()).or_insert(0) += 1;
}
