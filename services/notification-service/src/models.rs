use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A stored notification. `read_by` accumulates the users who have read it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub event_type: String,
    pub title: String,
    pub message: String,
    pub visible_to: Vec<Uuid>,
    pub related_entity: Option<Uuid>,
    pub read_by: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_read_by(&self, user_id: Uuid) -> bool {
        self.read_by.contains(&user_id)
    }
}

/// Notification shape returned by the read API, with the read flag resolved
/// for the requesting user.
#[derive(Debug, Serialize)]
pub struct NotificationView {
    pub id: Uuid,
    pub event_type: String,
    pub title: String,
    pub message: String,
    pub related_entity: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationView {
    pub fn for_user(notification: &Notification, user_id: Uuid) -> Self {
        Self {
            id: notification.id,
            event_type: notification.event_type.clone(),
            title: notification.title.clone(),
            message: notification.message.clone(),
            related_entity: notification.related_entity,
            read: notification.is_read_by(user_id),
            created_at: notification.created_at,
        }
    }
}
