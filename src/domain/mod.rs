//! Domain layer containing business entities and the click pipeline.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`broker`] - Topic writer/reader capabilities
//! - [`click_event`] - Click fact model carried over the broker
//! - [`enrichment`] - Geo and device enrichment of click facts
//! - [`click_producer`] - Publishing click facts with bounded retry
//! - [`click_dispatcher`] - Bounded publish queue fed by the redirect handler
//! - [`click_worker`] - Consumer pool persisting enriched clicks
//!
//! The domain layer depends only on traits; concrete brokers, stores and the
//! geo client live in [`crate::infrastructure`].
//!
//! # Click Processing Flow
//!
//! 1. HTTP handler resolves the alias and increments its counter
//! 2. A [`click_event::RawClickFact`] is queued on the [`click_dispatcher::ClickDispatcher`]
//! 3. [`click_dispatcher::PublishWorker`] hands it to the [`click_producer::EventProducer`]
//! 4. [`click_worker::ConsumerPool`] reads it back, enriches it and stores it
//!    via [`repositories::AnalyticsSink`]

pub mod broker;
pub mod click_dispatcher;
pub mod click_event;
pub mod click_producer;
pub mod click_worker;
pub mod enrichment;
pub mod entities;
pub mod repositories;
