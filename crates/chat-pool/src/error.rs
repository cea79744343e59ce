//! Pool error types.

use thiserror::Error;

/// Errors that can occur while building, borrowing from, or running a pool.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PoolError {
    /// The pool has been shut down; no further connections are handed out.
    #[error("pool is closed")]
    PoolClosed,

    /// No connection became available before the acquire deadline.
    #[error("timed out waiting for a pooled connection")]
    Timeout,

    /// Opening a connection failed.
    ///
    /// During the initial fill or a health-check replacement this is fatal
    /// for the pool: the pool cannot reach its guaranteed capacity.
    #[error("failed to open connection: {0}")]
    Connect(String),

    /// Invalid pool configuration.
    #[error("invalid pool configuration: {0}")]
    Config(String),
}

impl PoolError {
    /// Whether this error means the pool can no longer honor its capacity.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connect(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(PoolError::PoolClosed.to_string(), "pool is closed");
        assert_eq!(
            PoolError::Connect("access denied".into()).to_string(),
            "failed to open connection: access denied"
        );
    }

    #[test]
    fn test_only_connect_is_fatal() {
        assert!(PoolError::Connect("refused".into()).is_fatal());
        assert!(!PoolError::Timeout.is_fatal());
        assert!(!PoolError::PoolClosed.is_fatal());
        assert!(!PoolError::Config("bad".into()).is_fatal());
    }
}
