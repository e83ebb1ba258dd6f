//! Enrichment handler: geocode the customer address and write the
//! coordinates back through the CRM internal API.
//!
//! The write-back is idempotent (last-writer-wins on the CRM side), so this
//! handler needs no dedup store of its own; replays simply overwrite.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use event_bus::{EventEnvelope, EventHandler, HandlerError};
use reqwest::StatusCode;
use serde_json::json;

use crate::geocoding::Geocoder;

pub struct GeocodeHandler {
    geocoder: Arc<dyn Geocoder>,
    http: reqwest::Client,
    crm_base_url: String,
}

impl GeocodeHandler {
    pub fn new(geocoder: Arc<dyn Geocoder>, crm_base_url: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            geocoder,
            http,
            crm_base_url: crm_base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// HTTP status classification: server errors are worth retrying, client
/// errors mean the request itself is wrong and will never succeed.
fn classify_status(status: StatusCode, customer_id: &str) -> HandlerError {
    let reason = format!(
        "coordinate update for customer {} returned {}",
        customer_id, status
    );
    if status.is_server_error() {
        HandlerError::retryable(reason)
    } else {
        HandlerError::permanent(reason)
    }
}

/// Transport failures (timeouts, refused connections, resets) are always
/// transient.
fn classify_transport(err: &reqwest::Error, customer_id: &str) -> HandlerError {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect error"
    } else {
        "transport error"
    };
    HandlerError::retryable(format!(
        "coordinate update for customer {} failed: {}: {}",
        customer_id, kind, err
    ))
}

#[async_trait]
impl EventHandler for GeocodeHandler {
    async fn handle(&self, event: &EventEnvelope) -> Result<(), HandlerError> {
        let customer_id = event
            .str_field("customer_id")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| HandlerError::permanent("missing required field: customer_id"))?;
        let address = event
            .str_field("address")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| HandlerError::permanent("missing required field: address"))?;

        let (latitude, longitude) = self
            .geocoder
            .geocode(address)
            .await
            .map_err(|err| HandlerError::retryable(err.to_string()))?;

        let url = format!(
            "{}/internal/customers/{}/coordinates",
            self.crm_base_url, customer_id
        );

        let response = self
            .http
            .patch(&url)
            .json(&json!({ "latitude": latitude, "longitude": longitude }))
            .send()
            .await
            .map_err(|err| classify_transport(&err, customer_id))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, customer_id));
        }

        tracing::info!(
            customer_id = %customer_id,
            latitude = latitude,
            longitude = longitude,
            "customer coordinates written back"
        );
        Ok(())
    }
}
