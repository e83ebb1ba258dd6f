//! # Idempotent Consumer Library
//!
//! Durable deduplication for at-least-once event delivery, keyed by a
//! message's broker coordinates `(topic, partition, offset)` and backed by
//! PostgreSQL so it survives restarts and rebalances.
//!
//! ## Usage
//!
//! ```ignore
//! use event_bus::MessageCoordinates;
//! use idempotent_consumer::{IdempotencyStore, ProcessingResult};
//!
//! # async fn example(pool: sqlx::PgPool) -> anyhow::Result<()> {
//! let store = IdempotencyStore::new(pool);
//! let coords = MessageCoordinates::new("crm.customer.created", 0, 100);
//!
//! match store.process_if_new(&coords, || async {
//!     // side effect here
//!     Ok(())
//! }).await? {
//!     ProcessingResult::Success => {}
//!     ProcessingResult::AlreadyProcessed => {}
//!     ProcessingResult::Failed(_) => {}
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Handlers that want the mark committed atomically with their side effect
//! use [`IdempotencyStore::mark_in_tx`] inside their own transaction.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE processed_events (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     topic TEXT NOT NULL,
//!     partition INTEGER NOT NULL,
//!     "offset" BIGINT NOT NULL,
//!     metadata JSONB,
//!     processed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     UNIQUE (topic, partition, "offset")
//! );
//! ```
//!
//! Each service owns its database and therefore its own `processed_events`
//! table, so the consumer group is not part of the key.

use std::future::Future;

use chrono::Utc;
use event_bus::MessageCoordinates;
use sqlx::{PgPool, Postgres, Row, Transaction};

mod error;

pub use error::{IdempotencyError, IdempotencyResult};

/// Result of a guarded processing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingResult {
    /// First delivery; the side effect ran and the mark was recorded.
    Success,
    /// Replay; the side effect was skipped.
    AlreadyProcessed,
    /// The side effect failed; nothing was recorded.
    Failed(String),
}

/// PostgreSQL-backed dedup guard for one consumer group's side effects.
///
/// Clone-cheap; share across handler invocations.
#[derive(Clone)]
pub struct IdempotencyStore {
    pool: PgPool,
}

impl IdempotencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Optimistic existence check.
    pub async fn seen(&self, coordinates: &MessageCoordinates) -> IdempotencyResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM processed_events
                WHERE topic = $1 AND partition = $2 AND "offset" = $3
            ) AS seen
            "#,
        )
        .bind(&coordinates.topic)
        .bind(coordinates.partition)
        .bind(coordinates.offset)
        .fetch_one(&self.pool)
        .await?;

        let seen: bool = row.try_get("seen")?;
        if seen {
            tracing::debug!(coordinates = %coordinates, "event already processed");
        }
        Ok(seen)
    }

    /// Record the coordinates as processed. A unique-constraint conflict
    /// means another delivery won the race and is reported as `false`, never
    /// as an error.
    pub async fn mark(
        &self,
        coordinates: &MessageCoordinates,
        metadata: Option<serde_json::Value>,
    ) -> IdempotencyResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (topic, partition, "offset", metadata)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (topic, partition, "offset") DO NOTHING
            "#,
        )
        .bind(&coordinates.topic)
        .bind(coordinates.partition)
        .bind(coordinates.offset)
        .bind(&metadata)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            tracing::debug!(coordinates = %coordinates, "event marked processed");
        } else {
            tracing::debug!(coordinates = %coordinates, "duplicate mark ignored");
        }
        Ok(inserted)
    }

    /// Like [`mark`](Self::mark) but inside the caller's transaction, so the
    /// mark commits or rolls back together with the handler's side effect.
    pub async fn mark_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        coordinates: &MessageCoordinates,
        metadata: Option<serde_json::Value>,
    ) -> IdempotencyResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (topic, partition, "offset", metadata)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (topic, partition, "offset") DO NOTHING
            "#,
        )
        .bind(&coordinates.topic)
        .bind(coordinates.partition)
        .bind(coordinates.offset)
        .bind(&metadata)
        .execute(tx.as_mut())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Check-then-process combinator: runs `f` only for first deliveries and
    /// records the mark on success.
    pub async fn process_if_new<F, Fut>(
        &self,
        coordinates: &MessageCoordinates,
        f: F,
    ) -> IdempotencyResult<ProcessingResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), anyhow::Error>>,
    {
        if self.seen(coordinates).await? {
            return Ok(ProcessingResult::AlreadyProcessed);
        }

        match f().await {
            Ok(()) => {
                self.mark(coordinates, None).await?;
                Ok(ProcessingResult::Success)
            }
            Err(err) => {
                tracing::warn!(
                    coordinates = %coordinates,
                    error = ?err,
                    "guarded processing failed"
                );
                Ok(ProcessingResult::Failed(format!("{:#}", err)))
            }
        }
    }

    /// Delete marks older than the retention window. Run periodically to
    /// bound table growth; retention must comfortably exceed broker
    /// retention so replays still deduplicate.
    pub async fn cleanup_older_than(
        &self,
        retention: std::time::Duration,
    ) -> IdempotencyResult<u64> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(retention)
                .map_err(|e| anyhow::anyhow!("invalid retention duration: {}", e))?;

        let result = sqlx::query(r#"DELETE FROM processed_events WHERE processed_at < $1"#)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            tracing::info!(deleted = deleted, cutoff = %cutoff, "cleaned up old processed events");
        }
        Ok(deleted)
    }
}
