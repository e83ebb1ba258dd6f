//! Notification read API.

use actix_web::{error, web, HttpResponse};
use auth_core::Principal;
use uuid::Uuid;

use crate::db;
use crate::models::NotificationView;
use crate::AppState;

fn internal(err: sqlx::Error) -> actix_web::Error {
    tracing::error!(error = %err, "database error");
    error::ErrorInternalServerError("Internal server error")
}

/// `GET /notifications` — scope-filtered, newest first, with the read flag
/// resolved for the caller.
pub async fn list_notifications(
    state: web::Data<AppState>,
    principal: Principal,
) -> Result<HttpResponse, actix_web::Error> {
    let notifications = db::list_visible(&state.db, &principal.scope())
        .await
        .map_err(internal)?;

    let views: Vec<NotificationView> = notifications
        .iter()
        .map(|n| NotificationView::for_user(n, principal.user_id))
        .collect();

    Ok(HttpResponse::Ok().json(views))
}

/// `POST /notifications/{id}/read` — idempotent per user; an invisible
/// notification is indistinguishable from a missing one.
pub async fn mark_notification_read(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, actix_web::Error> {
    let id = path.into_inner();

    let notification = db::fetch(&state.db, id)
        .await
        .map_err(internal)?
        .filter(|n| principal.scope().permits(&n.visible_to))
        .ok_or_else(|| error::ErrorNotFound("Notification not found"))?;

    db::mark_read(&state.db, notification.id, principal.user_id)
        .await
        .map_err(internal)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}
