//! Audit log storage.
//!
//! The table itself is the idempotency record: one row per distinct
//! `(topic, partition, offset)`, enforced by a unique constraint. Rows are
//! never updated or deleted.

use async_trait::async_trait;
use event_bus::MessageCoordinates;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

/// Storage failures are transient by classification: the handler retries
/// them, so no audit event is lost to a flapping database.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("audit store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// The unique constraint fired: another delivery already recorded these
    /// coordinates. Not an error.
    AlreadyRecorded,
}

#[derive(Debug, Clone)]
pub struct NewAuditRecord {
    pub event_type: String,
    pub payload: serde_json::Value,
    pub tenant_id: Option<Uuid>,
    pub coordinates: MessageCoordinates,
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Optimistic pre-check before the insert.
    async fn already_recorded(&self, coordinates: &MessageCoordinates)
        -> Result<bool, StoreError>;

    /// Append one immutable record; a coordinate conflict reports
    /// [`AppendOutcome::AlreadyRecorded`].
    async fn append(&self, record: NewAuditRecord) -> Result<AppendOutcome, StoreError>;
}

pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn already_recorded(
        &self,
        coordinates: &MessageCoordinates,
    ) -> Result<bool, StoreError> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM audit_log
                WHERE topic = $1 AND partition = $2 AND "offset" = $3
            )
            "#,
        )
        .bind(&coordinates.topic)
        .bind(coordinates.partition)
        .bind(coordinates.offset)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn append(&self, record: NewAuditRecord) -> Result<AppendOutcome, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_log (event_type, payload, tenant_id, topic, partition, "offset")
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (topic, partition, "offset") DO NOTHING
            "#,
        )
        .bind(&record.event_type)
        .bind(&record.payload)
        .bind(record.tenant_id)
        .bind(&record.coordinates.topic)
        .bind(record.coordinates.partition)
        .bind(record.coordinates.offset)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            Ok(AppendOutcome::Appended)
        } else {
            Ok(AppendOutcome::AlreadyRecorded)
        }
    }
}

/// In-memory store for handler tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub(crate) struct InMemoryAuditStore {
        records: Mutex<HashMap<(String, i32, i64), NewAuditRecord>>,
        pub unavailable: AtomicBool,
    }

    impl InMemoryAuditStore {
        pub fn len(&self) -> usize {
            self.records.lock().unwrap().len()
        }

        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        fn check_available(&self) -> Result<(), StoreError> {
            if self.unavailable.load(Ordering::SeqCst) {
                Err(StoreError::Unavailable("connection refused".to_string()))
            } else {
                Ok(())
            }
        }

        fn key(coordinates: &MessageCoordinates) -> (String, i32, i64) {
            (
                coordinates.topic.clone(),
                coordinates.partition,
                coordinates.offset,
            )
        }
    }

    #[async_trait]
    impl AuditStore for InMemoryAuditStore {
        async fn already_recorded(
            &self,
            coordinates: &MessageCoordinates,
        ) -> Result<bool, StoreError> {
            self.check_available()?;
            Ok(self
                .records
                .lock()
                .unwrap()
                .contains_key(&Self::key(coordinates)))
        }

        async fn append(&self, record: NewAuditRecord) -> Result<AppendOutcome, StoreError> {
            self.check_available()?;
            let mut records = self.records.lock().unwrap();
            let key = Self::key(&record.coordinates);
            if records.contains_key(&key) {
                return Ok(AppendOutcome::AlreadyRecorded);
            }
            records.insert(key, record);
            Ok(AppendOutcome::Appended)
        }
    }
}
