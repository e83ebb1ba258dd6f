//! Retry/DLQ controller driving a handler for one message at a time.

use std::sync::Arc;
use std::time::Duration;

use crate::consumer::ShutdownSignal;
use crate::dlq::{DlqEnvelope, DlqSink};
use crate::envelope::{DecodeError, EventEnvelope, MessageCoordinates};
use crate::error::HandlerError;
use crate::handler::EventHandler;
use crate::metrics::ConsumerMetrics;

/// How many processed messages between periodic metrics log lines.
const METRICS_LOG_INTERVAL: u64 = 100;

/// Bounded exponential backoff for retryable handler failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total invocations ≤ max_retries + 1.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the retry following attempt `attempt` (0-based):
    /// `min(base * 2^attempt, cap)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.backoff_cap)
    }
}

/// Outcome of running one message through the controller.
///
/// Only terminal dispositions allow the offset to advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Handler succeeded.
    Processed,
    /// Message durably routed to the DLQ.
    DeadLettered,
    /// No durable outcome (DLQ write failed, or shutdown interrupted a
    /// backoff); the message stays uncommitted and will be redelivered.
    Incomplete,
}

impl Disposition {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Disposition::Incomplete)
    }
}

/// Runs handlers under the retry policy and routes failures to the DLQ.
pub(crate) struct RetryController {
    policy: RetryPolicy,
    group_id: String,
    dlq: Arc<dyn DlqSink>,
    metrics: Arc<ConsumerMetrics>,
    shutdown: ShutdownSignal,
}

impl RetryController {
    pub(crate) fn new(
        policy: RetryPolicy,
        group_id: String,
        dlq: Arc<dyn DlqSink>,
        metrics: Arc<ConsumerMetrics>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            policy,
            group_id,
            dlq,
            metrics,
            shutdown,
        }
    }

    /// Drive one decoded message to a disposition.
    pub(crate) async fn process(
        &self,
        handler: &dyn EventHandler,
        envelope: &EventEnvelope,
    ) -> Disposition {
        let coordinates = &envelope.coordinates;

        for attempt in 0..=self.policy.max_retries {
            match handler.handle(envelope).await {
                Ok(()) => {
                    let total = self.metrics.record_processed();
                    tracing::info!(
                        coordinates = %coordinates,
                        event_type = %envelope.event_type,
                        attempt = attempt,
                        "message processed"
                    );
                    if total % METRICS_LOG_INTERVAL == 0 {
                        self.metrics.log(&self.group_id);
                    }
                    return Disposition::Processed;
                }

                Err(HandlerError::Retryable(reason)) => {
                    self.metrics.record_retried();

                    if attempt < self.policy.max_retries {
                        let backoff = self.policy.backoff(attempt);
                        tracing::warn!(
                            coordinates = %coordinates,
                            event_type = %envelope.event_type,
                            error = %reason,
                            retry_attempt = attempt + 1,
                            backoff_secs = backoff.as_secs_f64(),
                            "retryable failure, backing off"
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(backoff) => {}
                            _ = self.shutdown.wait() => {
                                tracing::info!(
                                    coordinates = %coordinates,
                                    "shutdown during backoff, message left uncommitted"
                                );
                                return Disposition::Incomplete;
                            }
                        }
                    } else {
                        tracing::error!(
                            coordinates = %coordinates,
                            event_type = %envelope.event_type,
                            error = %reason,
                            retry_count = self.policy.max_retries,
                            "retries exhausted, dead-lettering"
                        );
                        return self
                            .dead_letter(
                                coordinates,
                                envelope.payload.clone(),
                                reason,
                                self.policy.max_retries,
                            )
                            .await;
                    }
                }

                Err(HandlerError::Permanent(reason)) => {
                    self.metrics.record_failed();
                    tracing::error!(
                        coordinates = %coordinates,
                        event_type = %envelope.event_type,
                        error = %reason,
                        "permanent failure, dead-lettering"
                    );
                    return self
                        .dead_letter(coordinates, envelope.payload.clone(), reason, 0)
                        .await;
                }
            }
        }

        Disposition::Incomplete
    }

    /// Route a record whose body never decoded; counted as a permanent
    /// failure with the raw bytes preserved for triage.
    pub(crate) async fn reject_undecodable(
        &self,
        coordinates: &MessageCoordinates,
        raw_payload: &[u8],
        error: &DecodeError,
    ) -> Disposition {
        self.metrics.record_failed();
        tracing::error!(
            coordinates = %coordinates,
            error = %error,
            "malformed payload, dead-lettering"
        );

        let payload = serde_json::json!({
            "raw": String::from_utf8_lossy(raw_payload),
        });
        self.dead_letter(coordinates, payload, format!("malformed payload: {}", error), 0)
            .await
    }

    async fn dead_letter(
        &self,
        coordinates: &MessageCoordinates,
        payload: serde_json::Value,
        reason: String,
        retry_count: u32,
    ) -> Disposition {
        let envelope = DlqEnvelope::new(coordinates, payload, reason, retry_count, &self.group_id);

        match self.dlq.send(envelope).await {
            Ok(()) => {
                self.metrics.record_dead_lettered();
                Disposition::DeadLettered
            }
            Err(err) => {
                tracing::error!(
                    coordinates = %coordinates,
                    error = %err,
                    "DLQ write failed, message left uncommitted"
                );
                Disposition::Incomplete
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::dlq::testing::RecordingDlq;

    /// Scripted handler: fails `failures` times with the given error, then
    /// succeeds.
    struct ScriptedHandler {
        error: HandlerError,
        failures: u32,
        calls: AtomicU32,
    }

    impl ScriptedHandler {
        fn failing_forever(error: HandlerError) -> Self {
            Self {
                error,
                failures: u32::MAX,
                calls: AtomicU32::new(0),
            }
        }

        fn failing_times(error: HandlerError, failures: u32) -> Self {
            Self {
                error,
                failures,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventHandler for ScriptedHandler {
        async fn handle(&self, _event: &EventEnvelope) -> Result<(), HandlerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(self.error.clone())
            } else {
                Ok(())
            }
        }
    }

    fn envelope() -> EventEnvelope {
        let coordinates = MessageCoordinates::new("crm.customer.created", 0, 100);
        EventEnvelope::decode(
            coordinates,
            Some(b"abc"),
            json!({"customer_id": "abc"}).to_string().as_bytes(),
        )
        .unwrap()
    }

    fn controller(
        policy: RetryPolicy,
        dlq: Arc<RecordingDlq>,
        metrics: Arc<ConsumerMetrics>,
    ) -> RetryController {
        RetryController::new(
            policy,
            "audit-group".to_string(),
            dlq,
            metrics,
            ShutdownSignal::default(),
        )
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_base: Duration::from_millis(100),
            backoff_cap: Duration::from_secs(5),
        }
    }

    #[test]
    fn backoff_doubles_per_attempt_up_to_cap() {
        let policy = RetryPolicy {
            max_retries: 10,
            backoff_base: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(60),
        };

        assert_eq!(policy.backoff(0), Duration::from_secs(2));
        assert_eq!(policy.backoff(1), Duration::from_secs(4));
        assert_eq!(policy.backoff(2), Duration::from_secs(8));
        assert_eq!(policy.backoff(4), Duration::from_secs(32));
        // 2 * 2^5 = 64 > cap
        assert_eq!(policy.backoff(5), Duration::from_secs(60));
        assert_eq!(policy.backoff(30), Duration::from_secs(60));
    }

    #[test]
    fn default_policy_matches_contract() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.backoff_base, Duration::from_secs(2));
        assert_eq!(policy.backoff_cap, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn success_on_first_attempt_is_terminal() {
        let dlq = Arc::new(RecordingDlq::default());
        let metrics = Arc::new(ConsumerMetrics::default());
        let controller = controller(fast_policy(2), dlq.clone(), metrics.clone());
        let handler = ScriptedHandler::failing_times(HandlerError::retryable("n/a"), 0);

        let disposition = controller.process(&handler, &envelope()).await;

        assert_eq!(disposition, Disposition::Processed);
        assert_eq!(handler.calls(), 1);
        assert!(dlq.envelopes().is_empty());
        assert_eq!(metrics.snapshot().processed, 1);
    }

    #[tokio::test]
    async fn permanent_failure_short_circuits_to_dlq() {
        let dlq = Arc::new(RecordingDlq::default());
        let metrics = Arc::new(ConsumerMetrics::default());
        let controller = controller(fast_policy(3), dlq.clone(), metrics.clone());
        let handler = ScriptedHandler::failing_forever(HandlerError::permanent("bad payload"));

        let disposition = controller.process(&handler, &envelope()).await;

        assert_eq!(disposition, Disposition::DeadLettered);
        assert_eq!(handler.calls(), 1);

        let envelopes = dlq.envelopes();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].retry_count, 0);
        assert_eq!(envelopes[0].original_topic, "crm.customer.created");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.dlq, 1);
        assert_eq!(snapshot.processed, 0);
        assert_eq!(snapshot.retried, 0);
    }

    #[tokio::test]
    async fn retryable_exhaustion_backs_off_then_dead_letters() {
        let dlq = Arc::new(RecordingDlq::default());
        let metrics = Arc::new(ConsumerMetrics::default());
        let controller = controller(fast_policy(2), dlq.clone(), metrics.clone());
        let handler = ScriptedHandler::failing_forever(HandlerError::retryable("db timeout"));

        let started = Instant::now();
        let disposition = controller.process(&handler, &envelope()).await;
        let elapsed = started.elapsed();

        assert_eq!(disposition, Disposition::DeadLettered);
        // max_retries + 1 invocations
        assert_eq!(handler.calls(), 3);
        // 100ms + 200ms of backoff
        assert!(elapsed >= Duration::from_millis(300), "elapsed {:?}", elapsed);

        let envelopes = dlq.envelopes();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].retry_count, 2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.retried, 3);
        assert_eq!(snapshot.dlq, 1);
        assert_eq!(snapshot.processed, 0);
        assert_eq!(snapshot.failed, 0);
    }

    #[tokio::test]
    async fn retryable_then_success_commits_without_dlq() {
        let dlq = Arc::new(RecordingDlq::default());
        let metrics = Arc::new(ConsumerMetrics::default());
        let controller = controller(fast_policy(2), dlq.clone(), metrics.clone());
        let handler = ScriptedHandler::failing_times(HandlerError::retryable("db timeout"), 2);

        let disposition = controller.process(&handler, &envelope()).await;

        assert_eq!(disposition, Disposition::Processed);
        assert_eq!(handler.calls(), 3);
        assert!(dlq.envelopes().is_empty());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.processed, 1);
        assert_eq!(snapshot.retried, 2);
        assert_eq!(snapshot.dlq, 0);
    }

    #[tokio::test]
    async fn dlq_failure_leaves_message_incomplete() {
        let dlq = Arc::new(RecordingDlq::failing());
        let metrics = Arc::new(ConsumerMetrics::default());
        let controller = controller(fast_policy(0), dlq.clone(), metrics.clone());
        let handler = ScriptedHandler::failing_forever(HandlerError::permanent("bad payload"));

        let disposition = controller.process(&handler, &envelope()).await;

        assert_eq!(disposition, Disposition::Incomplete);
        assert!(!disposition.is_terminal());
        // Nothing durably dead-lettered, so the counter must not move.
        assert_eq!(metrics.snapshot().dlq, 0);
    }

    #[tokio::test]
    async fn undecodable_payload_is_dead_lettered_with_raw_bytes() {
        let dlq = Arc::new(RecordingDlq::default());
        let metrics = Arc::new(ConsumerMetrics::default());
        let controller = controller(fast_policy(3), dlq.clone(), metrics.clone());

        let coordinates = MessageCoordinates::new("crm.customer.created", 1, 7);
        let error = EventEnvelope::decode(coordinates.clone(), None, b"{oops").unwrap_err();

        let disposition = controller
            .reject_undecodable(&coordinates, b"{oops", &error)
            .await;

        assert_eq!(disposition, Disposition::DeadLettered);

        let envelopes = dlq.envelopes();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].retry_count, 0);
        assert_eq!(envelopes[0].original_payload["raw"], "{oops");
        assert!(envelopes[0].failure_reason.starts_with("malformed payload"));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.dlq, 1);
    }

    #[tokio::test]
    async fn shutdown_interrupts_backoff() {
        let dlq = Arc::new(RecordingDlq::default());
        let metrics = Arc::new(ConsumerMetrics::default());
        let shutdown = ShutdownSignal::default();
        let controller = RetryController::new(
            RetryPolicy {
                max_retries: 3,
                backoff_base: Duration::from_secs(30),
                backoff_cap: Duration::from_secs(60),
            },
            "audit-group".to_string(),
            dlq.clone(),
            metrics,
            shutdown.clone(),
        );
        let handler = ScriptedHandler::failing_forever(HandlerError::retryable("db timeout"));

        let trigger = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                shutdown.trigger();
            })
        };

        let started = Instant::now();
        let disposition = controller.process(&handler, &envelope()).await;

        assert_eq!(disposition, Disposition::Incomplete);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(dlq.envelopes().is_empty());
        trigger.await.unwrap();
    }
}
