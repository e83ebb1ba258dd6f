//! Customer endpoints: create, list, fetch, update.

use actix_web::{web, HttpResponse};
use auth_core::Principal;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::customers::{self, CustomerUpdate, NewCustomer};
use crate::error::{CrmError, Result};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: Option<String>,
    /// Additional tenants granted visibility; the caller's tenant is always
    /// included.
    pub visibility_tenant_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// `POST /customers`
///
/// Requires an authenticated principal with a tenant; the record's
/// visibility defaults to the creating tenant plus any explicitly granted
/// tenants. The `crm.customer.created` event is published after the row
/// commits; publish failures are logged, not surfaced.
pub async fn create_customer(
    state: web::Data<AppState>,
    principal: Principal,
    payload: web::Json<CreateCustomerRequest>,
) -> Result<HttpResponse> {
    let tenant_id = principal.tenant_id.ok_or(CrmError::TenantRequired)?;
    let payload = payload.into_inner();

    for (field, value) in [
        ("name", &payload.name),
        ("email", &payload.email),
        ("address_line1", &payload.address_line1),
        ("city", &payload.city),
        ("state", &payload.state),
        ("postal_code", &payload.postal_code),
    ] {
        if value.trim().is_empty() {
            return Err(CrmError::Validation(format!("{} is required", field)));
        }
    }

    let mut visible_to = vec![tenant_id];
    for granted in payload.visibility_tenant_ids.unwrap_or_default() {
        if !visible_to.contains(&granted) {
            visible_to.push(granted);
        }
    }

    let customer = customers::insert(
        &state.db,
        NewCustomer {
            name: payload.name,
            email: payload.email,
            phone: payload.phone.unwrap_or_default(),
            address_line1: payload.address_line1,
            address_line2: payload.address_line2.unwrap_or_default(),
            city: payload.city,
            state: payload.state,
            postal_code: payload.postal_code,
            country: payload.country.unwrap_or_else(|| "USA".to_string()),
            visible_to,
            created_by_tenant: tenant_id,
        },
    )
    .await?;

    if let Err(err) = state.events.customer_created(&customer).await {
        tracing::error!(customer_id = %customer.id, error = %err, "failed to publish customer created event");
    }

    Ok(HttpResponse::Created().json(customer))
}

/// `GET /customers` — scoped list.
pub async fn list_customers(
    state: web::Data<AppState>,
    principal: Principal,
) -> Result<HttpResponse> {
    let customers = customers::list_visible(&state.db, &principal.scope()).await?;
    Ok(HttpResponse::Ok().json(customers))
}

/// `GET /customers/{id}` — scoped fetch; an invisible record is
/// indistinguishable from a missing one.
pub async fn get_customer(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let customer = customers::fetch_visible(&state.db, path.into_inner(), &principal.scope())
        .await?
        .ok_or(CrmError::NotFound("Customer"))?;

    Ok(HttpResponse::Ok().json(customer))
}

/// `PUT /customers/{id}` — scoped update of the contact fields; publishes
/// `crm.customer.updated`.
pub async fn update_customer(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    payload: web::Json<UpdateCustomerRequest>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let scope = principal.scope();

    // Scope check first so an invisible record 404s instead of mutating.
    customers::fetch_visible(&state.db, id, &scope)
        .await?
        .ok_or(CrmError::NotFound("Customer"))?;

    let payload = payload.into_inner();
    let customer = customers::update(
        &state.db,
        id,
        CustomerUpdate {
            name: payload.name,
            email: payload.email,
            phone: payload.phone,
        },
    )
    .await?
    .ok_or(CrmError::NotFound("Customer"))?;

    if let Err(err) = state.events.customer_updated(&customer).await {
        tracing::error!(customer_id = %customer.id, error = %err, "failed to publish customer updated event");
    }

    Ok(HttpResponse::Ok().json(customer))
}
