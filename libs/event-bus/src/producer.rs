//! Event producer for publishing domain events.

use std::time::Duration;

use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("failed to create Kafka producer: {0}")]
    Create(#[source] rdkafka::error::KafkaError),

    #[error("failed to serialize event payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to deliver event to {topic}: {reason}")]
    Delivery { topic: String, reason: String },
}

/// Kafka producer for domain events.
///
/// One instance per service, created at startup and passed explicitly into
/// whatever publishes. Delivery waits for acknowledgement from all in-sync
/// replicas.
pub struct EventProducer {
    producer: FutureProducer,
    send_timeout: Duration,
}

impl EventProducer {
    pub fn new(brokers: &str, client_id: &str) -> Result<Self, ProducerError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("client.id", client_id)
            .set("acks", "all")
            .set("message.send.max.retries", "3")
            .set("message.timeout.ms", "10000")
            .create()
            .map_err(ProducerError::Create)?;

        Ok(Self {
            producer,
            send_timeout: Duration::from_secs(10),
        })
    }

    /// Publish an event to a topic, keyed for partitioning (typically by the
    /// entity UUID).
    pub async fn publish(&self, topic: &str, key: &str, value: &Value) -> Result<(), ProducerError> {
        let payload = serde_json::to_string(value)?;
        let record = FutureRecord::to(topic).key(key).payload(&payload);

        match self.producer.send(record, self.send_timeout).await {
            Ok((partition, offset)) => {
                tracing::debug!(
                    topic = topic,
                    partition = partition,
                    offset = offset,
                    key = key,
                    "event delivered"
                );
                Ok(())
            }
            Err((err, _)) => {
                tracing::error!(topic = topic, key = key, error = %err, "event delivery failed");
                Err(ProducerError::Delivery {
                    topic: topic.to_string(),
                    reason: err.to_string(),
                })
            }
        }
    }
}
