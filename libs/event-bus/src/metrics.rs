//! Consumer counters, emitted as structured log lines.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic counters for one consumer instance.
///
/// `dlq` counts acknowledged dead-letter writes only; a failed DLQ write
/// leaves the message uncommitted and is not counted.
#[derive(Debug, Default)]
pub struct ConsumerMetrics {
    processed: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    dlq: AtomicU64,
}

/// Point-in-time view of [`ConsumerMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub processed: u64,
    pub retried: u64,
    pub failed: u64,
    pub dlq: u64,
}

impl ConsumerMetrics {
    /// Increment `processed`, returning the new total.
    pub fn record_processed(&self) -> u64 {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_lettered(&self) {
        self.dlq.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dlq: self.dlq.load(Ordering::Relaxed),
        }
    }

    /// Emit the counters as one structured log line.
    pub fn log(&self, consumer_group: &str) {
        let snapshot = self.snapshot();
        tracing::info!(
            consumer_group = consumer_group,
            messages_processed_total = snapshot.processed,
            messages_retried_total = snapshot.retried,
            messages_failed_total = snapshot.failed,
            messages_dlq_total = snapshot.dlq,
            "consumer metrics update"
        );
    }
}
