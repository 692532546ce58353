//! PostgreSQL implementation of the analytics sink.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{AggregatedStats, ClickDimensions, EnrichedClickRecord};
use crate::domain::repositories::AnalyticsSink;
use crate::error::AppError;

/// PostgreSQL sink for enriched click records.
///
/// Rows are only ever inserted. Statistics are recomputed from all rows of
/// an alias on every query.
pub struct PgAnalyticsSink {
    pool: Arc<PgPool>,
}

impl PgAnalyticsSink {
    /// Creates a new sink with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalyticsSink for PgAnalyticsSink {
    async fn save(&self, record: &EnrichedClickRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO enriched_clicks
                (alias, ip, country, city, device_type, os, browser, referer, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&record.alias)
        .bind(&record.ip)
        .bind(&record.country)
        .bind(&record.city)
        .bind(record.device.as_str())
        .bind(&record.os)
        .bind(&record.browser)
        .bind(&record.referer)
        .bind(record.timestamp)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn get_stats(&self, alias: &str) -> Result<Option<AggregatedStats>, AppError> {
        let exists: Option<(String,)> =
            sqlx::query_as("SELECT alias FROM short_links WHERE alias = $1")
                .bind(alias)
                .fetch_optional(self.pool.as_ref())
                .await?;

        if exists.is_none() {
            return Ok(None);
        }

        let rows = sqlx::query_as::<_, ClickDimensions>(
            r#"
            SELECT ip, country, device_type AS device, browser
            FROM enriched_clicks
            WHERE alias = $1
            "#,
        )
        .bind(alias)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(Some(AggregatedStats::from_rows(alias, rows)))
    }
}
