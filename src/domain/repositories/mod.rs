//! Repository trait definitions for the domain layer.
//!
//! These traits abstract data access so that services and the consumer pool
//! can run against PostgreSQL in production and against mocks or in-memory
//! doubles in tests.
//!
//! # Available Repositories
//!
//! - [`LinkStore`] - Short links and click counters
//! - [`AnalyticsSink`] - Enriched click records and statistics
//!
//! Implementations live in `crate::infrastructure::persistence`. Mock
//! implementations are generated via `mockall` for unit tests.

pub mod analytics_sink;
pub mod link_store;

pub use analytics_sink::AnalyticsSink;
pub use link_store::LinkStore;

#[cfg(test)]
pub use analytics_sink::MockAnalyticsSink;
#[cfg(test)]
pub use link_store::MockLinkStore;
