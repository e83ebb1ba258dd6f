use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A tenant node in the forest. `parent_id = None` marks a root.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
