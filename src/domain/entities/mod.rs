//! Core domain entities representing the business data model.
//!
//! # Entity Types
//!
//! - [`Link`] - A short alias mapped to its destination URL
//! - [`EnrichedClickRecord`] - A processed click, as stored for analytics
//! - [`AggregatedStats`] - Statistics computed from stored clicks
//!
//! Creation inputs use separate structs (`NewLink`) so that store-managed
//! fields such as `created_at` and `click_count` never come from callers.

pub mod click;
pub mod link;
pub mod stats;

pub use click::{DeviceClass, EnrichedClickRecord};
pub use link::{Link, NewLink};
pub use stats::{AggregatedStats, ClickDimensions};
