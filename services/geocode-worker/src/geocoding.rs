//! Geocoding client abstraction.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve an address line to `(latitude, longitude)`.
    async fn geocode(&self, address: &str) -> Result<(f64, f64), GeocodeError>;
}

/// Simulates an external geocoding API for zero-config operation: fixed
/// Sydney coordinates after a configurable latency.
pub struct MockGeocodingClient {
    latency: Duration,
}

impl MockGeocodingClient {
    pub fn new() -> Self {
        Self {
            latency: Duration::from_secs(1),
        }
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for MockGeocodingClient {
    fn default() -> Self {
        Self::new()
    }
}

fn round7(value: f64) -> f64 {
    (value * 1e7).round() / 1e7
}

#[async_trait]
impl Geocoder for MockGeocodingClient {
    async fn geocode(&self, address: &str) -> Result<(f64, f64), GeocodeError> {
        tracing::debug!(address = address, "geocoding address");
        tokio::time::sleep(self.latency).await;

        let (lat, lng) = (-33.8688, 151.2093);
        tracing::debug!(
            address = address,
            latitude = lat,
            longitude = lng,
            "address geocoded"
        );
        Ok((round7(lat), round7(lng)))
    }
}
