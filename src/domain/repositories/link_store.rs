//! Repository trait for short link data access.

use crate::domain::entities::{Link, NewLink};
use crate::error::AppError;
use async_trait::async_trait;

/// Storage of short links and their click counters.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgLinkStore`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
///
/// # Examples
///
/// See integration tests: `tests/repository_link.rs`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Creates a new short link.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the alias already exists.
    /// Returns [`AppError::Internal`] on database errors.
    async fn create(&self, new_link: NewLink) -> Result<Link, AppError>;

    /// Finds a link by its alias, expired or not.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_alias(&self, alias: &str) -> Result<Option<Link>, AppError>;

    /// Adds one to the link's click counter in a single atomic statement.
    ///
    /// Concurrent calls never lose updates. Incrementing an unknown alias is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn increment_clicks(&self, alias: &str) -> Result<(), AppError>;

    /// Returns `true` if the store is reachable.
    async fn ping(&self) -> bool;
}
