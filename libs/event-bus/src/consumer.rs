//! Consumer runtime: poll, decode, dispatch under retry policy, commit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::ClientConfig;
use thiserror::Error;

use crate::dlq::DlqSink;
use crate::envelope::{EventEnvelope, MessageCoordinates};
use crate::handler::EventHandler;
use crate::metrics::{ConsumerMetrics, MetricsSnapshot};
use crate::retry::{RetryController, RetryPolicy};

/// Cooperative stop flag shared between the poll loop and retry backoffs.
///
/// Triggering is idempotent; waiters registered before the trigger are woken
/// exactly once.
#[derive(Clone, Default)]
pub(crate) struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
    notify: Arc<tokio::sync::Notify>,
}

impl ShutdownSignal {
    pub(crate) fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub(crate) fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait(&self) {
        let notified = self.notify.notified();
        if self.is_triggered() {
            return;
        }
        notified.await;
    }
}

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("failed to create Kafka consumer: {0}")]
    Create(#[source] rdkafka::error::KafkaError),

    #[error("failed to subscribe to topics {topics:?}: {source}")]
    Subscribe {
        topics: Vec<String>,
        #[source]
        source: rdkafka::error::KafkaError,
    },
}

/// Construction parameters for an [`EventConsumer`].
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub brokers: String,
    pub group_id: String,
    pub topics: Vec<String>,
    pub retry: RetryPolicy,
    pub poll_timeout: Duration,
}

impl ConsumerConfig {
    pub fn new(
        brokers: impl Into<String>,
        group_id: impl Into<String>,
        topics: Vec<String>,
    ) -> Self {
        Self {
            brokers: brokers.into(),
            group_id: group_id.into(),
            topics,
            retry: RetryPolicy::default(),
            poll_timeout: Duration::from_secs(1),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Single-worker consumer loop for one group over one or more topics.
///
/// Subscribes with `auto.offset.reset=earliest` and auto-commit disabled;
/// offsets advance synchronously and only after a terminal disposition, so
/// within a partition a failing message holds the partition until it is
/// processed or durably dead-lettered.
pub struct EventConsumer {
    consumer: StreamConsumer,
    handler: Arc<dyn EventHandler>,
    controller: RetryController,
    metrics: Arc<ConsumerMetrics>,
    shutdown: ShutdownSignal,
    group_id: String,
    topics: Vec<String>,
    poll_timeout: Duration,
}

impl EventConsumer {
    pub fn new(
        config: ConsumerConfig,
        handler: Arc<dyn EventHandler>,
        dlq: Arc<dyn DlqSink>,
    ) -> Result<Self, ConsumerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", "30000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(ConsumerError::Create)?;

        let topic_refs: Vec<&str> = config.topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topic_refs)
            .map_err(|source| ConsumerError::Subscribe {
                topics: config.topics.clone(),
                source,
            })?;

        let metrics = Arc::new(ConsumerMetrics::default());
        let shutdown = ShutdownSignal::default();
        let controller = RetryController::new(
            config.retry,
            config.group_id.clone(),
            dlq,
            metrics.clone(),
            shutdown.clone(),
        );

        Ok(Self {
            consumer,
            handler,
            controller,
            metrics,
            shutdown,
            group_id: config.group_id,
            topics: config.topics,
            poll_timeout: config.poll_timeout,
        })
    }

    /// Current counter values.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Request a stop. Idempotent; wakes the poll loop and any in-flight
    /// retry backoff. Side effects already committed are not rolled back.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    /// Consume until [`stop`](Self::stop) is called.
    pub async fn start(&self) -> Result<(), ConsumerError> {
        tracing::info!(
            consumer_group = %self.group_id,
            topics = ?self.topics,
            "starting consumer"
        );

        while !self.shutdown.is_triggered() {
            let message = tokio::select! {
                _ = self.shutdown.wait() => break,
                polled = tokio::time::timeout(self.poll_timeout, self.consumer.recv()) => {
                    match polled {
                        // Poll timeout: loop around and re-check the stop flag.
                        Err(_) => continue,
                        Ok(Err(err)) => {
                            tracing::error!(
                                consumer_group = %self.group_id,
                                error = %err,
                                "Kafka consumer error"
                            );
                            continue;
                        }
                        Ok(Ok(message)) => message,
                    }
                }
            };

            self.handle_message(&message).await;
        }

        self.metrics.log(&self.group_id);
        tracing::info!(consumer_group = %self.group_id, "consumer stopped");
        Ok(())
    }

    async fn handle_message(&self, message: &BorrowedMessage<'_>) {
        let coordinates =
            MessageCoordinates::new(message.topic(), message.partition(), message.offset());
        let raw_payload = message.payload().unwrap_or_default();

        let disposition =
            match EventEnvelope::decode(coordinates.clone(), message.key(), raw_payload) {
                Ok(envelope) => {
                    self.controller
                        .process(self.handler.as_ref(), &envelope)
                        .await
                }
                Err(error) => {
                    self.controller
                        .reject_undecodable(&coordinates, raw_payload, &error)
                        .await
                }
            };

        if disposition.is_terminal() {
            if let Err(err) = self.consumer.commit_message(message, CommitMode::Sync) {
                tracing::error!(
                    consumer_group = %self.group_id,
                    coordinates = %coordinates,
                    error = %err,
                    "offset commit failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_contract() {
        let config = ConsumerConfig::new(
            "kafka:9092",
            "audit-service-group",
            vec!["crm.customer.created".to_string()],
        );

        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.poll_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn shutdown_signal_is_idempotent_and_wakes_waiters() {
        let signal = ShutdownSignal::default();
        assert!(!signal.is_triggered());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        signal.trigger();
        signal.trigger();

        assert!(signal.is_triggered());
        waiter.await.unwrap();

        // A wait after the trigger returns immediately.
        signal.wait().await;
    }
}
