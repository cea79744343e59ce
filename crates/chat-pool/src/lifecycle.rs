//! Connection lifecycle hooks.
//!
//! The pool never talks to a backend directly. A [`ConnectionLifecycle`]
//! implementation knows how to open, probe, and close one kind of resource;
//! the pool only decides *when* those hooks run.

use std::time::Duration;

use tokio::time::Instant;

use async_trait::async_trait;

use crate::error::PoolError;

/// Hooks for creating and maintaining one kind of pooled resource.
#[async_trait]
pub trait ConnectionLifecycle: Send + Sync + 'static {
    /// The pooled resource.
    type Connection: Send + 'static;

    /// Open a new connection.
    ///
    /// An error here is fatal for the path that asked for the connection
    /// (initial fill or health-check replacement).
    async fn connect(&self) -> Result<Self::Connection, PoolError>;

    /// Probe a connection that is currently borrowed by the health check.
    ///
    /// `idle_timeout` is the staleness threshold: connections active more
    /// recently than that may be reported healthy without a round-trip.
    async fn health_check(
        &self,
        conn: &mut Self::Connection,
        now: Instant,
        idle_timeout: Duration,
    ) -> HealthCheckResult;

    /// Close a connection that is leaving the pool. Best effort.
    fn close(&self, conn: Self::Connection);
}

/// Outcome of a health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthCheckResult {
    /// The connection answered, or was recently active.
    Healthy,
    /// The connection must be replaced.
    Unhealthy {
        /// Why the probe failed.
        reason: String,
    },
}

impl HealthCheckResult {
    /// Shorthand for an unhealthy result.
    pub fn unhealthy(reason: impl Into<String>) -> Self {
        Self::Unhealthy {
            reason: reason.into(),
        }
    }

    /// Whether the probe succeeded.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl From<bool> for HealthCheckResult {
    fn from(healthy: bool) -> Self {
        if healthy {
            Self::Healthy
        } else {
            Self::unhealthy("liveness probe failed")
        }
    }
}

/// Bookkeeping the pool keeps alongside each connection.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// Pool-unique connection id.
    pub id: u64,
    /// When the connection was opened.
    pub created_at: Instant,
    /// When the connection was last handed out.
    pub last_checkout: Option<Instant>,
    /// How many times the connection has been handed out.
    pub checkout_count: u64,
}

impl ConnectionMetadata {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            created_at: Instant::now(),
            last_checkout: None,
            checkout_count: 0,
        }
    }

    pub(crate) fn mark_checked_out(&mut self) {
        self.last_checkout = Some(Instant::now());
        self.checkout_count += 1;
    }

    /// Age of the connection.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}
