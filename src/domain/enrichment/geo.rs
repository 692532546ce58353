//! IP geolocation capability.

use async_trait::async_trait;
use thiserror::Error;

/// Location resolved for an IP address. Either part may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoLocation {
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("geo service unavailable: {0}")]
    Unavailable(String),

    #[error("geo service returned status {0}")]
    Status(u16),

    #[error("malformed geo response: {0}")]
    MalformedBody(String),

    #[error("geo lookup timed out")]
    TimedOut,
}

/// Resolves an IP address to a coarse location over the network.
///
/// Implementations: [`crate::infrastructure::geo::IpGeolocationClient`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeoLocator: Send + Sync {
    async fn locate(&self, ip: &str) -> Result<GeoLocation, GeoError>;
}
