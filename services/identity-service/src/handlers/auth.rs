//! Authentication endpoints: login and current-user lookup.

use actix_web::{web, HttpResponse};
use auth_core::{Principal, Role, TokenService};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::{IdentityError, Result};
use crate::models::UserProfile;
use crate::security;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserProfile,
}

/// `POST /auth/login`
///
/// Unknown email and wrong password are indistinguishable (both 401);
/// disabled accounts are 403 after the password check so probing stays
/// uninformative.
pub async fn login(
    state: web::Data<AppState>,
    tokens: web::Data<TokenService>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    let email = payload
        .email
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(IdentityError::MissingCredentials)?;
    let password = payload
        .password
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(IdentityError::MissingCredentials)?;

    let user = db::users::find_by_email(&state.db, email)
        .await?
        .ok_or(IdentityError::InvalidCredentials)?;

    if !security::verify_password(password, &user.password_hash) {
        return Err(IdentityError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(IdentityError::AccountDisabled);
    }

    let role = user.role();
    let visible_tenant_ids = visible_tenant_ids(&state.db, role, user.tenant_id).await?;

    let principal = Principal {
        user_id: user.id,
        email: user.email.clone(),
        role,
        tenant_id: user.tenant_id,
        visible_tenant_ids,
    };
    let token = tokens
        .issue(&principal)
        .map_err(|e| IdentityError::Token(e.to_string()))?;

    let tenant_name = tenant_name(&state.db, user.tenant_id).await?;

    tracing::info!(user_id = %user.id, role = %role, "user logged in");

    Ok(HttpResponse::Ok().json(LoginResponse {
        token,
        user: UserProfile::from_user(&user, tenant_name),
    }))
}

/// `GET /auth/me`
pub async fn me(state: web::Data<AppState>, principal: Principal) -> Result<HttpResponse> {
    let user = db::users::find_by_id(&state.db, principal.user_id)
        .await?
        .ok_or(IdentityError::NotFound("User"))?;

    let tenant_name = tenant_name(&state.db, user.tenant_id).await?;

    Ok(HttpResponse::Ok().json(MeResponse {
        user: UserProfile::from_user(&user, tenant_name),
    }))
}

/// The closure cached into the token at login: SYSTEM_ADMIN sees everything
/// (empty list), TENANT_ADMIN its subtree, USER its own tenant. A non-admin
/// without a tenant gets an empty scope.
async fn visible_tenant_ids(
    pool: &PgPool,
    role: Role,
    tenant_id: Option<Uuid>,
) -> Result<Vec<Uuid>> {
    Ok(match (role, tenant_id) {
        (Role::SystemAdmin, _) => Vec::new(),
        (Role::TenantAdmin, Some(tenant)) => db::tenants::visibility_scope(pool, tenant).await?,
        (Role::User, Some(tenant)) => vec![tenant],
        (_, None) => Vec::new(),
    })
}

async fn tenant_name(pool: &PgPool, tenant_id: Option<Uuid>) -> Result<Option<String>> {
    Ok(match tenant_id {
        Some(id) => db::tenants::find(pool, id).await?.map(|t| t.name),
        None => None,
    })
}
