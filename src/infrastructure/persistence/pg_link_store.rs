//! PostgreSQL implementation of the link store.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;

use crate::domain::entities::{Link, NewLink};
use crate::domain::repositories::LinkStore;
use crate::error::AppError;

/// PostgreSQL store for short links.
///
/// Click counting relies on a single `UPDATE ... SET click_count = click_count + 1`
/// so concurrent redirects never lose increments.
pub struct PgLinkStore {
    pool: Arc<PgPool>,
}

impl PgLinkStore {
    /// Creates a new store with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkStore for PgLinkStore {
    async fn create(&self, new_link: NewLink) -> Result<Link, AppError> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            INSERT INTO short_links (alias, original_url, expires_at)
            VALUES ($1, $2, $3)
            RETURNING alias, original_url, created_at, expires_at, click_count
            "#,
        )
        .bind(&new_link.alias)
        .bind(&new_link.original_url)
        .bind(new_link.expires_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn find_by_alias(&self, alias: &str) -> Result<Option<Link>, AppError> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT alias, original_url, created_at, expires_at, click_count
            FROM short_links
            WHERE alias = $1
            "#,
        )
        .bind(alias)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn increment_clicks(&self, alias: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE short_links SET click_count = click_count + 1 WHERE alias = $1")
            .bind(alias)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn ping(&self) -> bool {
        match sqlx::query("SELECT 1").execute(self.pool.as_ref()).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Database ping failed");
                false
            }
        }
    }
}
