//! Decoded event representation handed to handlers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Position of a record on the broker. Unique per consumed message and used
/// as the idempotency key by handlers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageCoordinates {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl MessageCoordinates {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
        }
    }
}

impl fmt::Display for MessageCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.topic, self.partition, self.offset)
    }
}

/// Why a raw record could not be turned into an [`EventEnvelope`].
///
/// Decode failures are structural and therefore routed to the DLQ as
/// permanent, without ever reaching a handler.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("payload is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// A decoded event plus the broker metadata the runtime attaches.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    /// Taken from the payload's `event_type` field, defaulting to the topic
    /// name when absent.
    pub event_type: String,
    /// Record key as UTF-8, usually the entity UUID.
    pub key: Option<String>,
    /// The full decoded payload object.
    pub payload: Value,
    pub coordinates: MessageCoordinates,
}

impl EventEnvelope {
    /// Decode a raw record body (UTF-8 JSON object) into an envelope.
    pub fn decode(
        coordinates: MessageCoordinates,
        key: Option<&[u8]>,
        payload: &[u8],
    ) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(payload)?;
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(DecodeError::NotAnObject);
        }

        let event_type = value
            .get("event_type")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| coordinates.topic.clone());

        let key = key.map(|k| String::from_utf8_lossy(k).into_owned());

        Ok(Self {
            event_type,
            key,
            payload: value,
            coordinates,
        })
    }

    /// String field from the payload, if present and a string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(Value::as_str)
    }

    /// Raw field from the payload.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn coords() -> MessageCoordinates {
        MessageCoordinates::new("crm.customer.created", 0, 100)
    }

    #[test]
    fn decodes_payload_and_keeps_coordinates() {
        let body = json!({
            "event_type": "customer_created",
            "customer_id": "abc",
        })
        .to_string();

        let envelope = EventEnvelope::decode(coords(), Some(b"abc"), body.as_bytes()).unwrap();

        assert_eq!(envelope.event_type, "customer_created");
        assert_eq!(envelope.key.as_deref(), Some("abc"));
        assert_eq!(envelope.str_field("customer_id"), Some("abc"));
        assert_eq!(envelope.coordinates.topic, "crm.customer.created");
        assert_eq!(envelope.coordinates.partition, 0);
        assert_eq!(envelope.coordinates.offset, 100);
    }

    #[test]
    fn event_type_defaults_to_topic() {
        let body = json!({"customer_id": "abc"}).to_string();

        let envelope = EventEnvelope::decode(coords(), None, body.as_bytes()).unwrap();

        assert_eq!(envelope.event_type, "crm.customer.created");
    }

    #[test]
    fn rejects_invalid_json() {
        let err = EventEnvelope::decode(coords(), None, b"{not json").unwrap_err();
        assert!(matches!(err, DecodeError::NotJson(_)));
    }

    #[test]
    fn rejects_non_object_payload() {
        let err = EventEnvelope::decode(coords(), None, b"[1, 2, 3]").unwrap_err();
        assert!(matches!(err, DecodeError::NotAnObject));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = EventEnvelope::decode(coords(), None, &[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, DecodeError::NotUtf8(_)));
    }

    #[test]
    fn coordinates_display_is_colon_separated() {
        assert_eq!(coords().to_string(), "crm.customer.created:0:100");
    }
}
