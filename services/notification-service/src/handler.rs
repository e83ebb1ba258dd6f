//! Notification fan-out handler for `crm.customer.created`.

use std::sync::Arc;

use async_trait::async_trait;
use event_bus::{EventEnvelope, EventHandler, HandlerError};
use serde_json::Value;
use uuid::Uuid;

use crate::store::{InsertOutcome, NewNotification, NotificationStore, StoreError};

pub struct NotificationHandler {
    store: Arc<dyn NotificationStore>,
}

impl NotificationHandler {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }
}

fn retryable(err: StoreError) -> HandlerError {
    HandlerError::retryable(err.to_string())
}

/// The visibility list must be an array of tenant UUID strings; anything
/// else is a schema violation. An absent list defaults to empty.
fn parse_visibility_list(event: &EventEnvelope) -> Result<Vec<Uuid>, HandlerError> {
    let raw = match event.field("visibility_list") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(raw) => raw,
    };

    let entries = raw.as_array().ok_or_else(|| {
        HandlerError::permanent(format!("visibility_list must be a list, got {}", raw))
    })?;

    entries
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .and_then(|raw| Uuid::parse_str(raw).ok())
                .ok_or_else(|| {
                    HandlerError::permanent(format!(
                        "visibility_list entries must be tenant UUIDs, got {}",
                        entry
                    ))
                })
        })
        .collect()
}

#[async_trait]
impl EventHandler for NotificationHandler {
    async fn handle(&self, event: &EventEnvelope) -> Result<(), HandlerError> {
        let customer_id = event
            .str_field("customer_id")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| HandlerError::permanent("missing required field: customer_id"))?;
        let name = event
            .str_field("name")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| HandlerError::permanent("missing required field: name"))?;

        let related_entity = Uuid::parse_str(customer_id).map_err(|_| {
            HandlerError::permanent(format!("customer_id is not a UUID: {}", customer_id))
        })?;
        let visible_to = parse_visibility_list(event)?;

        let notification = NewNotification {
            event_type: event.event_type.clone(),
            title: format!("New Customer: {}", name),
            message: format!(
                "A new customer '{}' has been added to your system.",
                name
            ),
            visible_to,
            related_entity: Some(related_entity),
        };

        let outcome = self
            .store
            .insert_if_new(&event.coordinates, notification)
            .await
            .map_err(retryable)?;

        match outcome {
            InsertOutcome::Inserted => {
                tracing::info!(
                    coordinates = %event.coordinates,
                    customer_id = %customer_id,
                    "notification created"
                );
            }
            InsertOutcome::AlreadyProcessed => {
                tracing::debug!(
                    coordinates = %event.coordinates,
                    "event already processed, notification skipped"
                );
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
    use crate::store::testing::InMemoryNotificationStore;

    fn envelope_with(payload: Value) -> EventEnvelope {
        EventEnvelope::decode(
            MessageCoordinates::new("crm.customer.created", 0, 100),
            None,
            payload.to_string().as_bytes(),
        )
        .unwrap()
    }

    fn valid_payload(tenants: &[Uuid]) -> Value {
        json!({
            "customer_id": Uuid::new_v4().to_string(),
            "name": "Acme Pty Ltd",
            "visibility_list": tenants.iter().map(Uuid::to_string).collect::<Vec<_>>(),
        })
    }

    #[tokio::test]
    async fn creates_a_notification_with_the_event_visibility() {
        let store = Arc::new(InMemoryNotificationStore::default());
        let handler = NotificationHandler::new(store.clone());
        let tenants = vec![Uuid::new_v4(), Uuid::new_v4()];

        handler
            .handle(&envelope_with(valid_payload(&tenants)))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        let notification = store.last().unwrap();
        assert_eq!(notification.visible_to, tenants);
        assert_eq!(notification.title, "New Customer: Acme Pty Ltd");
    }

    #[tokio::test]
    async fn replaying_the_same_coordinates_inserts_nothing() {
        let store = Arc::new(InMemoryNotificationStore::default());
        let handler = NotificationHandler::new(store.clone());
        let event = envelope_with(valid_payload(&[Uuid::new_v4()]));

        handler.handle(&event).await.unwrap();
        handler.handle(&event).await.unwrap();

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn missing_name_is_permanent() {
        let store = Arc::new(InMemoryNotificationStore::default());
        let handler = NotificationHandler::new(store.clone());

        let err = handler
            .handle(&envelope_with(json!({
                "customer_id": Uuid::new_v4().to_string(),
            })))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Permanent(_)));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn non_list_visibility_is_permanent() {
        let store = Arc::new(InMemoryNotificationStore::default());
        let handler = NotificationHandler::new(store.clone());

        let err = handler
            .handle(&envelope_with(json!({
                "customer_id": Uuid::new_v4().to_string(),
                "name": "Acme",
                "visibility_list": "everyone",
            })))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Permanent(_)));
    }

    #[tokio::test]
    async fn non_uuid_visibility_entries_are_permanent() {
        let store = Arc::new(InMemoryNotificationStore::default());
        let handler = NotificationHandler::new(store.clone());

        let err = handler
            .handle(&envelope_with(json!({
                "customer_id": Uuid::new_v4().to_string(),
                "name": "Acme",
                "visibility_list": ["not-a-uuid"],
            })))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Permanent(_)));
    }

    #[tokio::test]
    async fn absent_visibility_defaults_to_empty() {
        let store = Arc::new(InMemoryNotificationStore::default());
        let handler = NotificationHandler::new(store.clone());

        handler
            .handle(&envelope_with(json!({
                "customer_id": Uuid::new_v4().to_string(),
                "name": "Acme",
            })))
            .await
            .unwrap();

        assert_eq!(store.last().unwrap().visible_to, Vec::<Uuid>::new());
    }

    #[tokio::test]
    async fn store_outage_is_retryable() {
        let store = Arc::new(InMemoryNotificationStore::default());
        store.set_unavailable(true);
        let handler = NotificationHandler::new(store.clone());

        let err = handler
            .handle(&envelope_with(valid_payload(&[])))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(store.len(), 0);
    }
}
