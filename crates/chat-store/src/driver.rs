//! Transport seam between a pooled connection and the datastore.
//!
//! A [`Driver`] opens sessions; a [`Session`] runs one parameterized
//! statement at a time. The wire protocol lives behind these traits.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::row::ResultSet;
use crate::value::Value;

/// Well-known server error codes.
pub mod codes {
    /// Authentication rejected.
    pub const ACCESS_DENIED: u16 = 1045;
    /// Unique constraint violated.
    pub const DUPLICATE_ENTRY: u16 = 1062;
    /// Statement could not be parsed.
    pub const PARSE_ERROR: u16 = 1064;
    /// Host could not be reached.
    pub const CONN_HOST_ERROR: u16 = 2003;
    /// Server closed the session.
    pub const SERVER_GONE: u16 = 2006;
}

/// Failure reported by a driver, with server diagnostics when available.
///
/// Server diagnostics may echo user-supplied values; treat them as untrusted
/// when forwarding them anywhere but the log.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("datastore error {code}: {message}")]
pub struct DriverError {
    /// Server or client error code.
    pub code: u16,
    /// Human-readable message.
    pub message: String,
    /// Server-provided diagnostics.
    pub diagnostics: Option<String>,
}

impl DriverError {
    /// Create an error without server diagnostics.
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            diagnostics: None,
        }
    }

    /// Attach server diagnostics.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = Some(diagnostics.into());
        self
    }
}

/// Opens sessions against a datastore.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Open and authenticate a session.
    async fn connect(&self, config: &Config) -> Result<Box<dyn Session>, DriverError>;
}

/// One authenticated datastore session.
#[async_trait]
pub trait Session: Send {
    /// Prepare `sql`, bind `params` positionally, and run it.
    ///
    /// Statements that return no rows yield an empty [`ResultSet`].
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError>;

    /// Close the session. Called once, when the owning connection drops.
    fn close(&mut self);
}
