//! Dead-letter queue producer and envelope.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::envelope::MessageCoordinates;
use crate::producer::ProducerError;
use crate::topics;

/// Structured failure record routed to `<topic>.dlq.<group>`.
///
/// Carries enough metadata to replay or triage the original message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEnvelope {
    pub original_topic: String,
    pub original_partition: i32,
    pub original_offset: i64,
    pub original_payload: Value,
    pub failure_reason: String,
    pub retry_count: u32,
    pub failed_at: DateTime<Utc>,
    pub consumer_group: String,
}

impl DlqEnvelope {
    pub fn new(
        coordinates: &MessageCoordinates,
        original_payload: Value,
        failure_reason: impl Into<String>,
        retry_count: u32,
        consumer_group: impl Into<String>,
    ) -> Self {
        Self {
            original_topic: coordinates.topic.clone(),
            original_partition: coordinates.partition,
            original_offset: coordinates.offset,
            original_payload,
            failure_reason: failure_reason.into(),
            retry_count,
            failed_at: Utc::now(),
            consumer_group: consumer_group.into(),
        }
    }

    /// Destination topic: `<original_topic>.dlq.<consumer_group>`.
    pub fn dlq_topic(&self) -> String {
        topics::dlq_topic(&self.original_topic, &self.consumer_group)
    }

    /// Record key: `<topic>:<partition>:<offset>` of the origin.
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.original_topic, self.original_partition, self.original_offset
        )
    }
}

#[derive(Debug, Error)]
pub enum DlqError {
    #[error("failed to serialize DLQ envelope: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to deliver DLQ record: {0}")]
    Delivery(String),
}

/// Destination for dead-lettered messages.
///
/// A send failure must leave the original message uncommitted so it is
/// reprocessed; implementations never panic the consumer.
#[async_trait]
pub trait DlqSink: Send + Sync {
    async fn send(&self, envelope: DlqEnvelope) -> Result<(), DlqError>;
}

/// Kafka-backed [`DlqSink`], one instance per service.
pub struct DlqProducer {
    producer: FutureProducer,
    send_timeout: Duration,
}

impl DlqProducer {
    pub fn new(brokers: &str) -> Result<Self, ProducerError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("client.id", "dlq-producer")
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
}

#[async_trait]
impl DlqSink for DlqProducer {
    async fn send(&self, envelope: DlqEnvelope) -> Result<(), DlqError> {
        let topic = envelope.dlq_topic();
        let key = envelope.key();
        let payload = serde_json::to_string(&envelope)?;

        let record = FutureRecord::to(&topic).key(&key).payload(&payload);

        match self.producer.send(record, self.send_timeout).await {
            Ok((partition, offset)) => {
                tracing::debug!(
                    topic = %topic,
                    partition = partition,
                    offset = offset,
                    key = %key,
                    "DLQ record delivered"
                );
                Ok(())
            }
            Err((err, _)) => {
                tracing::error!(topic = %topic, key = %key, error = %err, "DLQ delivery failed");
                Err(DlqError::Delivery(err.to_string()))
            }
        }
    }
}
