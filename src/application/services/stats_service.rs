//! Click statistics service.

use std::sync::Arc;

use crate::domain::entities::AggregatedStats;
use crate::domain::repositories::AnalyticsSink;
use crate::error::AppError;
use serde_json::json;

/// Service for retrieving aggregated click statistics.
pub struct StatsService {
    sink: Arc<dyn AnalyticsSink>,
}

impl StatsService {
    /// Creates a new statistics service.
    pub fn new(sink: Arc<dyn AnalyticsSink>) -> Self {
        Self { sink }
    }

    /// Aggregates every recorded click of `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no link matches the alias.
    /// Returns [`AppError::Internal`] on database errors.
    pub async fn get_stats(&self, alias: &str) -> Result<AggregatedStats, AppError> {
        self.sink
            .get_stats(alias)
            .await?
            .ok_or_else(|| AppError::not_found("Statistics not found", json!({ "alias": alias })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockAnalyticsSink;

    #[tokio::test]
    async fn test_get_stats_found() {
        let mut sink = MockAnalyticsSink::new();
        sink.expect_get_stats()
            .withf(|a| a == "abc123")
            .times(1)
            .returning(|a| {
                let mut stats = AggregatedStats::empty(a);
                stats.total_clicks = 5;
                stats.unique_ips = 2;
                Ok(Some(stats))
            });

        let stats = StatsService::new(Arc::new(sink))
            .get_stats("abc123")
            .await
            .unwrap();

        assert_eq!(stats.alias, "abc123");
        assert_eq!(stats.total_clicks, 5);
        assert_eq!(stats.unique_ips, 2);
    }

    #[tokio::test]
    async fn test_get_stats_zero_clicks() {
        let mut sink = MockAnalyticsSink::new();
        sink.expect_get_stats()
            .returning(|a| Ok(Some(AggregatedStats::empty(a))));

        let stats = StatsService::new(Arc::new(sink))
            .get_stats("fresh")
            .await
            .unwrap();

        assert_eq!(stats.total_clicks, 0);
    }

    #[tokio::test]
    async fn test_get_stats_not_found() {
        let mut sink = MockAnalyticsSink::new();
        sink.expect_get_stats().times(1).returning(|_| Ok(None));

        let err = StatsService::new(Arc::new(sink))
            .get_stats("missing")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_stats_propagates_errors() {
        let mut sink = MockAnalyticsSink::new();
        sink.expect_get_stats()
            .returning(|_| Err(AppError::internal("Database error", json!({}))));

        let err = StatsService::new(Arc::new(sink))
            .get_stats("abc")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal { .. }));
    }
}
