//! # Event Bus Library
//!
//! Kafka plumbing shared by every service: a producer with delivery
//! guarantees, a dead-letter producer, and a consumer runtime that drives
//! handlers under a retry/DLQ policy with manual offset commits.
//!
//! ## Processing model
//!
//! ```text
//! Kafka → EventConsumer → RetryController → EventHandler → side effects
//!                              ↓ (exhausted / permanent)
//!                          DlqProducer → <topic>.dlq.<group>
//! ```
//!
//! Delivery is at-least-once: an offset is committed only after the handler
//! terminally succeeds or the DLQ write is acknowledged, so handlers must be
//! idempotent (see the `idempotent-consumer` crate).
//!
//! Handlers classify their own failures through [`HandlerError`]:
//! - `Retryable` — transient (timeouts, 5xx peers, connection loss); retried
//!   with exponential backoff, then dead-lettered.
//! - `Permanent` — structural (malformed payloads, 4xx peers, schema
//!   violations); dead-lettered immediately, never retried.
//!
//! The runtime switches on the variant alone and never inspects failure text.

pub mod consumer;
pub mod dlq;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod producer;
pub mod retry;
pub mod topics;

pub use consumer::{ConsumerConfig, ConsumerError, EventConsumer};
pub use dlq::{DlqEnvelope, DlqError, DlqProducer, DlqSink};
pub use envelope::{DecodeError, EventEnvelope, MessageCoordinates};
pub use error::HandlerError;
pub use handler::EventHandler;
pub use metrics::{ConsumerMetrics, MetricsSnapshot};
pub use producer::{EventProducer, ProducerError};
pub use retry::{Disposition, RetryPolicy};
