//! Geolocation service clients.

pub mod ipgeolocation;

pub use ipgeolocation::{DEFAULT_GEO_API_URL, IpGeolocationClient};
