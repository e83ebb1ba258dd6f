//! Tenant queries, including the hierarchy closure.
//!
//! Descendants are materialised with a single recursive query; the cycle
//! check runs before any parent mutation (see `hierarchy` for the closure
//! semantics).

use auth_core::VisibilityScope;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{IdentityError, Result};
use crate::hierarchy;
use crate::models::Tenant;

pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Tenant>> {
    let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(tenant)
}

/// All tenant IDs strictly below `id`, in traversal order.
pub async fn descendant_ids(pool: &PgPool, id: Uuid) -> Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        WITH RECURSIVE subtree AS (
            SELECT id FROM tenants WHERE parent_id = $1
            UNION ALL
            SELECT t.id FROM tenants t JOIN subtree s ON t.parent_id = s.id
        )
        SELECT id FROM subtree
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// The tenant itself plus all descendants; what a TENANT_ADMIN may see.
pub async fn visibility_scope(pool: &PgPool, id: Uuid) -> Result<Vec<Uuid>> {
    let mut scope = vec![id];
    scope.extend(descendant_ids(pool, id).await?);
    Ok(scope)
}

pub async fn create(pool: &PgPool, name: &str, parent_id: Option<Uuid>) -> Result<Tenant> {
    if let Some(parent) = parent_id {
        if find(pool, parent).await?.is_none() {
            return Err(IdentityError::NotFound("Parent tenant"));
        }
    }

    let tenant = sqlx::query_as::<_, Tenant>(
        r#"
        INSERT INTO tenants (name, parent_id)
        VALUES ($1, $2)
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(parent_id)
    .fetch_one(pool)
    .await?;

    Ok(tenant)
}

/// Re-parent a tenant, rejecting any edge that would make the parent
/// reachable from the child.
pub async fn set_parent(pool: &PgPool, id: Uuid, new_parent: Option<Uuid>) -> Result<Tenant> {
    if find(pool, id).await?.is_none() {
        return Err(IdentityError::NotFound("Tenant"));
    }

    if let Some(parent) = new_parent {
        if find(pool, parent).await?.is_none() {
            return Err(IdentityError::NotFound("Parent tenant"));
        }
        let edges: Vec<(Uuid, Option<Uuid>)> = sqlx::query_as("SELECT id, parent_id FROM tenants")
            .fetch_all(pool)
            .await?;
        if hierarchy::would_create_cycle(&edges, id, parent) {
            return Err(IdentityError::HierarchyCycle(format!(
                "{} is below {}",
                parent, id
            )));
        }
    }

    let tenant = sqlx::query_as::<_, Tenant>(
        r#"
        UPDATE tenants
        SET parent_id = $2, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(new_parent)
    .fetch_one(pool)
    .await?;

    Ok(tenant)
}

/// Tenants the caller may observe, newest first.
pub async fn list_visible(pool: &PgPool, scope: &VisibilityScope) -> Result<Vec<Tenant>> {
    let tenants = match scope.as_filter() {
        None => {
            sqlx::query_as::<_, Tenant>("SELECT * FROM tenants ORDER BY created_at DESC")
                .fetch_all(pool)
                .await?
        }
        Some(ids) if ids.is_empty() => Vec::new(),
        Some(ids) => {
            sqlx::query_as::<_, Tenant>(
                "SELECT * FROM tenants WHERE id = ANY($1) ORDER BY created_at DESC",
            )
            .bind(ids)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(tenants)
}
