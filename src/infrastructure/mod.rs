//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer.
//!
//! # Modules
//!
//! - [`broker`] - Redis Streams click topic
//! - [`geo`] - IP geolocation HTTP client
//! - [`persistence`] - PostgreSQL repository implementations

pub mod broker;
pub mod geo;
pub mod persistence;
