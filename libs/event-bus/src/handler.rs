//! The contract between the consumer runtime and event handlers.

use async_trait::async_trait;

use crate::envelope::EventEnvelope;
use crate::error::HandlerError;

/// A consumer-group-specific event processor.
///
/// Invocations within a partition are strictly sequential, and a message may
/// be delivered more than once; implementations must make their side effects
/// idempotent (typically by recording the envelope's coordinates).
///
/// Returning `Ok(())` marks the message terminally processed. Failures must
/// be classified through [`HandlerError`]; the runtime decides retry versus
/// DLQ from the variant alone.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &EventEnvelope) -> Result<(), HandlerError>;
}
