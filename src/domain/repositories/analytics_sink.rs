//! Repository trait for enriched click records.

use crate::domain::entities::{AggregatedStats, EnrichedClickRecord};
use crate::error::AppError;
use async_trait::async_trait;

/// Append-only storage of enriched clicks plus the stats query.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgAnalyticsSink`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Appends one record. Duplicates are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn save(&self, record: &EnrichedClickRecord) -> Result<(), AppError>;

    /// Aggregates every stored click of `alias`.
    ///
    /// # Returns
    ///
    /// - `Ok(None)` if no short link with this alias exists
    /// - `Ok(Some(stats))` otherwise, zero-valued when it has no clicks
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn get_stats(&self, alias: &str) -> Result<Option<AggregatedStats>, AppError>;
}
