//! Application layer services implementing business logic.
//!
//! Services consume repository traits and provide a clean API for HTTP
//! handlers.
//!
//! # Available Services
//!
//! - [`services::link_service::LinkService`] - Short link creation, resolution and click counting
//! - [`services::stats_service::StatsService`] - Aggregated click statistics

pub mod services;
