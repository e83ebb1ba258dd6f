//! Tenant administration endpoints.

use actix_web::{web, HttpResponse};
use auth_core::Principal;
use serde::Deserialize;
use uuid::Uuid;

use crate::db;
use crate::error::{IdentityError, Result};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub name: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SetParentRequest {
    pub parent_id: Option<Uuid>,
}

/// `POST /tenants` — SYSTEM_ADMIN only. Publishes `identity.tenant.created`
/// after the row commits; a publish failure is logged, not surfaced, since
/// the tenant already exists.
pub async fn create_tenant(
    state: web::Data<AppState>,
    principal: Principal,
    payload: web::Json<CreateTenantRequest>,
) -> Result<HttpResponse> {
    if !principal.is_system_admin() {
        return Err(IdentityError::Forbidden);
    }

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(IdentityError::Validation("name is required".to_string()));
    }

    let tenant = db::tenants::create(&state.db, name, payload.parent_id).await?;

    if let Err(err) = state.events.tenant_created(&tenant).await {
        tracing::error!(tenant_id = %tenant.id, error = %err, "failed to publish tenant created event");
    }

    Ok(HttpResponse::Created().json(tenant))
}

/// `GET /tenants` — scoped to the caller's visibility.
pub async fn list_tenants(
    state: web::Data<AppState>,
    principal: Principal,
) -> Result<HttpResponse> {
    let tenants = db::tenants::list_visible(&state.db, &principal.scope()).await?;
    Ok(HttpResponse::Ok().json(tenants))
}

/// `PATCH /tenants/{id}` — SYSTEM_ADMIN only; re-parents a tenant, rejecting
/// edges that would close a cycle.
pub async fn set_tenant_parent(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    payload: web::Json<SetParentRequest>,
) -> Result<HttpResponse> {
    if !principal.is_system_admin() {
        return Err(IdentityError::Forbidden);
    }

    let tenant = db::tenants::set_parent(&state.db, path.into_inner(), payload.parent_id).await?;
    Ok(HttpResponse::Ok().json(tenant))
}
