//! Consumer-side notification storage.
//!
//! The insert and the idempotency mark share one transaction, so a replayed
//! event either inserts both or neither.

use async_trait::async_trait;
use event_bus::MessageCoordinates;
use idempotent_consumer::{IdempotencyError, IdempotencyStore};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("notification store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<IdempotencyError> for StoreError {
    fn from(err: IdempotencyError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// These coordinates were already marked processed; nothing inserted.
    AlreadyProcessed,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub event_type: String,
    pub title: String,
    pub message: String,
    pub visible_to: Vec<Uuid>,
    pub related_entity: Option<Uuid>,
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_if_new(
        &self,
        coordinates: &MessageCoordinates,
        notification: NewNotification,
    ) -> Result<InsertOutcome, StoreError>;
}

pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn insert_if_new(
        &self,
        coordinates: &MessageCoordinates,
        notification: NewNotification,
    ) -> Result<InsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let marked = IdempotencyStore::mark_in_tx(&mut tx, coordinates, None).await?;
        if !marked {
            tx.rollback().await?;
            return Ok(InsertOutcome::AlreadyProcessed);
        }

        sqlx::query(
            r#"
            INSERT INTO notifications (event_type, title, message, visible_to, related_entity)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&notification.event_type)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.visible_to)
        .bind(notification.related_entity)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;
        Ok(InsertOutcome::Inserted)
    }
}

/// In-memory store for handler tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub(crate) struct InMemoryNotificationStore {
        processed: Mutex<HashSet<(String, i32, i64)>>,
        notifications: Mutex<HashMap<usize, NewNotification>>,
        pub unavailable: AtomicBool,
    }

    impl InMemoryNotificationStore {
        pub fn len(&self) -> usize {
            self.notifications.lock().unwrap().len()
        }

        pub fn last(&self) -> Option<NewNotification> {
            let notifications = self.notifications.lock().unwrap();
            notifications
                .keys()
                .max()
                .and_then(|key| notifications.get(key).cloned())
        }

        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl NotificationStore for InMemoryNotificationStore {
        async fn insert_if_new(
            &self,
            coordinates: &MessageCoordinates,
            notification: NewNotification,
        ) -> Result<InsertOutcome, StoreError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }

            let key = (
                coordinates.topic.clone(),
                coordinates.partition,
                coordinates.offset,
            );
            let mut processed = self.processed.lock().unwrap();
            if !processed.insert(key) {
                return Ok(InsertOutcome::AlreadyProcessed);
            }

            let mut notifications = self.notifications.lock().unwrap();
            let next = notifications.len();
            notifications.insert(next, notification);
            Ok(InsertOutcome::Inserted)
        }
    }
}
