//! Data Transfer Objects for API requests and responses.
//!
//! Request DTOs use Serde for deserialization and validator for input
//! validation. The stats endpoint serializes
//! [`crate::domain::entities::AggregatedStats`] directly.

pub mod health;
pub mod shorten;
