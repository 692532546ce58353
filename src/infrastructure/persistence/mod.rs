//! PostgreSQL repository implementations.
//!
//! Concrete implementations of the domain repository traits using SQLx
//! runtime-checked queries.
//!
//! # Repositories
//!
//! - [`PgLinkStore`] - Short links and atomic click counters
//! - [`PgAnalyticsSink`] - Enriched click records and statistics

pub mod pg_analytics_sink;
pub mod pg_link_store;

pub use pg_analytics_sink::PgAnalyticsSink;
pub use pg_link_store::PgLinkStore;
