//! Error types for datastore access.

use chat_pool::PoolError;
use thiserror::Error;

use crate::driver::DriverError;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by configuration, connection setup, and row decoding.
///
/// Statement execution never surfaces one of these; see
/// [`Lookup`](crate::Lookup).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Could not open a session with the datastore.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        /// Datastore host.
        host: String,
        /// Datastore port.
        port: u16,
        /// Driver failure.
        #[source]
        source: DriverError,
    },

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed settings document.
    #[error("invalid settings document: {0}")]
    Settings(#[from] serde_json::Error),

    /// A column value could not be converted to the requested type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Type that was requested.
        expected: &'static str,
        /// What was found instead.
        actual: String,
    },

    /// Pool failure.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl From<Error> for PoolError {
    fn from(err: Error) -> Self {
        match err {
            Error::Pool(err) => err,
            Error::Config(msg) => PoolError::Config(msg),
            other => PoolError::Connect(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_maps_to_fatal_pool_error() {
        let err = Error::Connect {
            host: "db.internal".into(),
            port: 3306,
            source: DriverError::new(1045, "Access denied for user 'chat'"),
        };
        let pool_err: PoolError = err.into();
        assert!(pool_err.is_fatal());
        assert!(pool_err.to_string().contains("db.internal:3306"));
    }

    #[test]
    fn test_pool_error_round_trips() {
        let pool_err: PoolError = Error::Pool(PoolError::Timeout).into();
        assert_eq!(pool_err, PoolError::Timeout);
    }
}
