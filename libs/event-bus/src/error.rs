//! Failure classification crossing the handler/runtime boundary.

use thiserror::Error;

/// The only failure signal a handler may surface to the runtime.
///
/// The consumer switches on the variant tag alone: `Retryable` goes through
/// exponential backoff before dead-lettering, `Permanent` is dead-lettered
/// immediately. Handlers own the classification; the runtime never inspects
/// the reason text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("retryable failure: {0}")]
    Retryable(String),

    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl HandlerError {
    pub fn retryable(reason: impl Into<String>) -> Self {
        HandlerError::Retryable(reason.into())
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        HandlerError::Permanent(reason.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, HandlerError::Retryable(_))
    }

    /// The classification-free reason, as recorded in DLQ envelopes.
    pub fn reason(&self) -> &str {
        match self {
            HandlerError::Retryable(reason) | HandlerError::Permanent(reason) => reason,
        }
    }
}

/// Unclassified errors are treated as retryable so transient faults cannot
/// lose data. Handlers are expected to classify explicitly; this is only the
/// safety net.
impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        HandlerError::Retryable(format!("{:#}", err))
    }
}
