//! Shared application state injected into every handler.

use std::sync::Arc;

use crate::application::services::{LinkService, StatsService};
use crate::domain::click_dispatcher::ClickDispatcher;
use crate::domain::repositories::{AnalyticsSink, LinkStore};
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub link_service: Arc<LinkService>,
    pub stats_service: Arc<StatsService>,
    pub click_dispatcher: ClickDispatcher,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wires services around the given stores.
    pub fn new(
        link_store: Arc<dyn LinkStore>,
        analytics_sink: Arc<dyn AnalyticsSink>,
        click_dispatcher: ClickDispatcher,
        metrics: Arc<Metrics>,
        base_url: &str,
    ) -> Self {
        Self {
            link_service: Arc::new(LinkService::new(link_store, base_url)),
            stats_service: Arc::new(StatsService::new(analytics_sink)),
            click_dispatcher,
            metrics,
        }
    }
}
