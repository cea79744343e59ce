//! Pool configuration.

use std::time::Duration;

use crate::error::PoolError;

/// Configuration for a connection pool.
///
/// The pool is filled eagerly with [`pool_size`](Self::pool_size) connections
/// and never grows past that number; broken connections are replaced
/// one-for-one by the health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of connections the pool owns.
    pub pool_size: u32,

    /// Time between two health-check sweeps.
    pub health_check_interval: Duration,

    /// Idle time after which a connection must answer a liveness probe.
    pub idle_timeout: Duration,

    /// Deadline applied by [`Pool::get`](crate::Pool::get).
    ///
    /// `None` waits until a connection is returned or the pool shuts down.
    pub connection_timeout: Option<Duration>,

    /// Whether the background health-check task runs.
    pub health_check: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            health_check_interval: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(60),
            connection_timeout: Some(Duration::from_secs(30)),
            health_check: true,
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of pooled connections.
    #[must_use]
    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the health-check interval.
    #[must_use]
    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Set the idle time after which connections are probed.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the acquire deadline, or `None` to wait indefinitely.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Enable or disable the background health check.
    #[must_use]
    pub fn health_check(mut self, enabled: bool) -> Self {
        self.health_check = enabled;
        self
    }

    /// Check that the configuration describes a usable pool.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.pool_size == 0 {
            return Err(PoolError::Config("pool_size must be at least 1".into()));
        }
        if self.health_check_interval < Duration::from_secs(1) {
            return Err(PoolError::Config(
                "health_check_interval must be at least one second".into(),
            ));
        }
        if self.idle_timeout < Duration::from_secs(1) {
            return Err(PoolError::Config(
                "idle_timeout must be at least one second".into(),
            ));
        }
        if self.connection_timeout == Some(Duration::ZERO) {
            return Err(PoolError::Config(
                "connection_timeout must be non-zero when set".into(),
            ));
        }
        Ok(())
    }
}
