//! HTTP client for an ipgeolocation.io style lookup API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::enrichment::{GeoError, GeoLocation, GeoLocator};

pub const DEFAULT_GEO_API_URL: &str = "https://api.ipgeolocation.io/ipgeo";

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    country_name: Option<String>,
    #[serde(default)]
    city: Option<String>,
}

/// Looks up `GET <base_url>?apiKey=<key>&ip=<ip>` and reads `country_name`
/// and `city` from the JSON body.
pub struct IpGeolocationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl IpGeolocationClient {
    /// # Errors
    ///
    /// Returns [`GeoError::Unavailable`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GeoError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeoError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl GeoLocator for IpGeolocationClient {
    async fn locate(&self, ip: &str) -> Result<GeoLocation, GeoError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[("apiKey", self.api_key.as_str()), ("ip", ip)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeoError::TimedOut
                } else {
                    GeoError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeoError::Status(status.as_u16()));
        }

        let body: GeoResponse = response
            .json()
            .await
            .map_err(|e| GeoError::MalformedBody(e.to_string()))?;

        Ok(GeoLocation {
            country: body.country_name,
            city: body.city,
        })
    }
}
