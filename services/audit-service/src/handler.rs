//! Audit append handler.
//!
//! Consumes every domain event and appends one immutable row per distinct
//! broker position. Replays are detected by the optimistic pre-check, or by
//! the unique constraint when two deliveries race.

use std::sync::Arc;

use async_trait::async_trait;
use event_bus::{EventEnvelope, EventHandler, HandlerError};
use uuid::Uuid;

use crate::store::{AppendOutcome, AuditStore, NewAuditRecord, StoreError};

pub struct AuditHandler {
    store: Arc<dyn AuditStore>,
}

impl AuditHandler {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }
}

fn retryable(err: StoreError) -> HandlerError {
    HandlerError::retryable(err.to_string())
}

#[async_trait]
impl EventHandler for AuditHandler {
    async fn handle(&self, event: &EventEnvelope) -> Result<(), HandlerError> {
        let coordinates = &event.coordinates;

        if coordinates.topic.is_empty() || coordinates.partition < 0 || coordinates.offset < 0 {
            return Err(HandlerError::permanent(format!(
                "invalid broker metadata: {}",
                coordinates
            )));
        }

        if self
            .store
            .already_recorded(coordinates)
            .await
            .map_err(retryable)?
        {
            tracing::debug!(coordinates = %coordinates, "audit record already exists, skipping");
            return Ok(());
        }

        let tenant_id = event
            .str_field("tenant_id")
            .and_then(|raw| Uuid::parse_str(raw).ok());

        let outcome = self
            .store
            .append(NewAuditRecord {
                event_type: event.event_type.clone(),
                payload: event.payload.clone(),
                tenant_id,
                coordinates: coordinates.clone(),
            })
            .await
            .map_err(retryable)?;

        match outcome {
            AppendOutcome::Appended => {
                tracing::info!(
                    coordinates = %coordinates,
                    event_type = %event.event_type,
                    "audit record appended"
                );
            }
            AppendOutcome::AlreadyRecorded => {
                tracing::debug!(coordinates = %coordinates, "lost append race, already recorded");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use event_bus::MessageCoordinates;
    use serde_json::json;

    use super::*;
    use crate::store::testing::InMemoryAuditStore;

    fn envelope(topic: &str, partition: i32, offset: i64) -> EventEnvelope {
        EventEnvelope::decode(
            MessageCoordinates::new(topic, partition, offset),
            Some(b"abc"),
            json!({
                "customer_id": "abc",
                "tenant_id": Uuid::new_v4().to_string(),
            })
            .to_string()
            .as_bytes(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn appends_one_record_per_event() {
        let store = Arc::new(InMemoryAuditStore::default());
        let handler = AuditHandler::new(store.clone());

        handler
            .handle(&envelope("crm.customer.created", 0, 100))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn replaying_the_same_coordinates_changes_nothing() {
        let store = Arc::new(InMemoryAuditStore::default());
        let handler = AuditHandler::new(store.clone());
        let event = envelope("crm.customer.created", 0, 100);

        handler.handle(&event).await.unwrap();
        handler.handle(&event).await.unwrap();

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn distinct_partitions_produce_distinct_records() {
        let store = Arc::new(InMemoryAuditStore::default());
        let handler = AuditHandler::new(store.clone());

        handler
            .handle(&envelope("crm.customer.created", 0, 100))
            .await
            .unwrap();
        handler
            .handle(&envelope("crm.customer.created", 1, 100))
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn invalid_metadata_is_permanent() {
        let store = Arc::new(InMemoryAuditStore::default());
        let handler = AuditHandler::new(store.clone());

        let err = handler
            .handle(&envelope("crm.customer.created", -1, 100))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Permanent(_)));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn store_outage_is_retryable() {
        let store = Arc::new(InMemoryAuditStore::default());
        store.set_unavailable(true);
        let handler = AuditHandler::new(store.clone());

        let err = handler
            .handle(&envelope("crm.customer.created", 0, 100))
            .await
            .unwrap_err();

        assert!(err.is_retryable());

        // Once the store recovers, the same delivery goes through.
        store.set_unavailable(false);
        handler
            .handle(&envelope("crm.customer.created", 0, 100))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
    }
}
