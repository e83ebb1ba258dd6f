//! Read-API queries over stored notifications.

use auth_core::VisibilityScope;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Notification;

/// Notifications the scope may observe, newest first.
pub async fn list_visible(
    pool: &PgPool,
    scope: &VisibilityScope,
) -> Result<Vec<Notification>, sqlx::Error> {
    let notifications = match scope.as_filter() {
        None => {
            sqlx::query_as::<_, Notification>(
                "SELECT * FROM notifications ORDER BY created_at DESC",
            )
            .fetch_all(pool)
            .await?
        }
        Some(ids) if ids.is_empty() => Vec::new(),
        Some(ids) => {
            sqlx::query_as::<_, Notification>(
                r#"
                SELECT * FROM notifications
                WHERE visible_to && $1
                ORDER BY created_at DESC
                "#,
            )
            .bind(ids)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(notifications)
}

pub async fn fetch(pool: &PgPool, id: Uuid) -> Result<Option<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Add the user to `read_by`. Idempotent: marking twice is a no-op.
pub async fn mark_read(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE notifications
        SET read_by = array_append(read_by, $2)
        WHERE id = $1 AND NOT (read_by @> ARRAY[$2])
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}
