//! Turning raw click facts into enriched analytics records.
//!
//! Enrichment combines two sources:
//!
//! - a best-effort network geolocation lookup ([`GeoLocator`]), bounded by a
//!   timeout and allowed to fail;
//! - offline user-agent parsing ([`DeviceParser`]), which cannot fail.
//!
//! A failed geo lookup never fails enrichment; the record is stored with
//! country and city unset.

pub mod device;
pub mod geo;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::domain::click_event::RawClickFact;
use crate::domain::entities::EnrichedClickRecord;
use crate::metrics::Metrics;

pub use device::{DeviceInfo, DeviceParser};
pub use geo::{GeoError, GeoLocation, GeoLocator};

#[cfg(test)]
pub use geo::MockGeoLocator;

pub const DEFAULT_GEO_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnrichError {
    /// The fact cannot be attributed to any short link.
    #[error("click fact has no alias")]
    MissingAlias,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, fact: &RawClickFact) -> Result<EnrichedClickRecord, EnrichError>;
}

/// Default [`Enricher`] combining geo lookup and device parsing.
pub struct ClickEnricher {
    geo: Option<Arc<dyn GeoLocator>>,
    devices: DeviceParser,
    geo_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl ClickEnricher {
    /// `geo` is `None` when no geolocation service is configured.
    pub fn new(
        geo: Option<Arc<dyn GeoLocator>>,
        geo_timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            geo,
            devices: DeviceParser::new(),
            geo_timeout,
            metrics,
        }
    }

    async fn locate(&self, ip: &str) -> GeoLocation {
        let Some(geo) = &self.geo else {
            return GeoLocation::default();
        };
        if ip.is_empty() {
            return GeoLocation::default();
        }

        let timer = self.metrics.enrich_duration_seconds.start_timer();
        let result = match tokio::time::timeout(self.geo_timeout, geo.locate(ip)).await {
            Ok(res) => res,
            Err(_) => Err(GeoError::TimedOut),
        };
        timer.observe_duration();

        match result {
            Ok(location) => GeoLocation {
                country: non_empty(location.country),
                city: non_empty(location.city),
            },
            Err(e) => {
                debug!(ip, error = %e, "Geo lookup failed, continuing without location");
                GeoLocation::default()
            }
        }
    }
}

#[async_trait]
impl Enricher for ClickEnricher {
    async fn enrich(&self, fact: &RawClickFact) -> Result<EnrichedClickRecord, EnrichError> {
        if fact.alias.trim().is_empty() {
            return Err(EnrichError::MissingAlias);
        }

        let location = self.locate(&fact.ip).await;
        let device = self.devices.parse(&fact.user_agent);

        Ok(EnrichedClickRecord {
            alias: fact.alias.clone(),
            ip: fact.ip.clone(),
            country: location.country,
            city: location.city,
            device: device.device,
            os: device.os,
            browser: device.browser,
            referer: non_empty(Some(fact.referer.clone())),
            timestamp: fact.timestamp,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
