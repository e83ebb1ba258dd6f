//! Internal service-to-service endpoints.
//!
//! Unauthenticated by design: reachable only on the trusted service network.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::db::customers;
use crate::error::{CrmError, Result};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CoordinatesRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// `PATCH /internal/customers/{id}/coordinates`
///
/// Called by the geocode worker. Idempotent last-writer-wins: replays simply
/// overwrite the coordinates and refresh `geocoded_at`.
pub async fn update_coordinates(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: web::Json<CoordinatesRequest>,
) -> Result<HttpResponse> {
    let latitude = payload
        .latitude
        .ok_or_else(|| CrmError::Validation("latitude is required".to_string()))?;
    let longitude = payload
        .longitude
        .ok_or_else(|| CrmError::Validation("longitude is required".to_string()))?;

    let customer_id = path.into_inner();
    let updated = customers::update_coordinates(&state.db, customer_id, latitude, longitude).await?;
    if !updated {
        return Err(CrmError::NotFound("Customer"));
    }

    tracing::info!(
        customer_id = %customer_id,
        latitude = latitude,
        longitude = longitude,
        "customer coordinates updated"
    );

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "customer_id": customer_id.to_string(),
        "latitude": latitude,
        "longitude": longitude,
    })))
}
