use thiserror::Error;

pub type IdempotencyResult<T> = Result<T, IdempotencyError>;

#[derive(Debug, Error)]
pub enum IdempotencyError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl IdempotencyError {
    /// Whether the failure looks transient (pool exhaustion, lost
    /// connections, timeouts) and is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            IdempotencyError::Database(err) => matches!(
                err,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            IdempotencyError::Other(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_are_transient() {
        let err = IdempotencyError::Database(sqlx::Error::PoolTimedOut);
        assert!(err.is_transient());
    }

    #[test]
    fn other_errors_are_not_transient() {
        let err = IdempotencyError::Other(anyhow::anyhow!("bad input"));
        assert!(!err.is_transient());
    }
}
