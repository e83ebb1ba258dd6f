use auth_core::Role;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A user row. `tenant_id` is nullable because SYSTEM_ADMIN users belong to
/// no tenant.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub tenant_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Stored role, falling back to the least-privileged role on an
    /// unrecognised value.
    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or(Role::User)
    }
}

/// User shape returned by the auth endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub tenant_id: Option<Uuid>,
    pub tenant_name: Option<String>,
}

impl UserProfile {
    pub fn from_user(user: &User, tenant_name: Option<String>) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role.clone(),
            tenant_id: user.tenant_id,
            tenant_name,
        }
    }
}
