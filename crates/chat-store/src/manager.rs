//! Pool wiring for datastore connections.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chat_pool::{ConnectionLifecycle, HealthCheckResult, Pool, PoolConfig, PoolError, PooledConnection};
use tokio::time::Instant;

use crate::config::Config;
use crate::connection::Connection;
use crate::driver::Driver;
use crate::statement::StatementRegistry;

/// A pool of datastore connections.
pub type StorePool = Pool<ConnectionManager>;

/// A datastore connection borrowed from a [`StorePool`].
pub type StoreGuard = PooledConnection<ConnectionManager>;

/// Opens, probes, and closes datastore connections for the pool.
pub struct ConnectionManager {
    config: Config,
    driver: Arc<dyn Driver>,
    statements: Arc<StatementRegistry>,
}

impl ConnectionManager {
    /// Create a manager using the standard statement set.
    pub fn new(config: Config, driver: Arc<dyn Driver>) -> Self {
        Self::with_statements(config, driver, StatementRegistry::standard())
    }

    /// Create a manager with a custom statement registry.
    pub fn with_statements(
        config: Config,
        driver: Arc<dyn Driver>,
        statements: StatementRegistry,
    ) -> Self {
        Self {
            config,
            driver,
            statements: Arc::new(statements),
        }
    }

    /// Connection configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Statements shared by every connection.
    #[must_use]
    pub fn statements(&self) -> &StatementRegistry {
        &self.statements
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.config.endpoint())
            .field("database", &self.config.database)
            .field("statements", &self.statements.len())
            .finish()
    }
}

#[async_trait]
impl ConnectionLifecycle for ConnectionManager {
    type Connection = Connection;

    async fn connect(&self) -> Result<Connection, PoolError> {
        Connection::connect(&self.config, self.driver.as_ref(), Arc::clone(&self.statements))
            .await
            .map_err(PoolError::from)
    }

    async fn health_check(
        &self,
        conn: &mut Connection,
        now: Instant,
        idle_timeout: Duration,
    ) -> HealthCheckResult {
        if conn.probe(now, idle_timeout).await {
            HealthCheckResult::Healthy
        } else {
            HealthCheckResult::unhealthy("heartbeat failed")
        }
    }

    fn close(&self, conn: Connection) {
        conn.close();
    }
}

/// Build and fill a datastore pool.
///
/// Fails if any of the initial connections cannot be opened.
pub async fn connect_pool(
    config: Config,
    pool_config: PoolConfig,
    driver: Arc<dyn Driver>,
) -> Result<StorePool, PoolError> {
    Pool::new(ConnectionManager::new(config, driver), pool_config).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connection::tests::{Script, one_row};
    use crate::driver::{DriverError, codes};

    fn manager(script: &Script) -> ConnectionManager {
        ConnectionManager::new(Config::new().database("chat"), Arc::new(script.clone()))
    }

    #[tokio::test]
    async fn test_health_check_maps_probe() {
        let script = Script::default();
        let manager = manager(&script);
        let mut conn = manager.connect().await.unwrap();

        let later = Instant::now() + Duration::from_secs(120);
        script.answer(Ok(one_row()));
        assert!(manager.health_check(&mut conn, later, Duration::from_secs(60)).await.is_healthy());

        script.answer(Err(DriverError::new(codes::SERVER_GONE, "gone")));
        assert!(!manager.health_check(&mut conn, later, Duration::from_secs(60)).await.is_healthy());
    }

    #[tokio::test]
    async fn test_connect_failure_is_fatal_pool_error() {
        let script = Script::default();
        let manager = ConnectionManager::new(
            Config::new().credentials(crate::Credentials::new("chat", "wrong")),
            Arc::new(script),
        );
        let err = manager.connect().await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_close_closes_session() {
        let script = Script::default();
        let manager = manager(&script);
        let conn = manager.connect().await.unwrap();
        manager.close(conn);
        assert_eq!(*script.closed.lock().unwrap(), 1);
    }

    #[test]
    fn test_debug_omits_credentials() {
        let manager = ConnectionManager::new(
            Config::new().credentials(crate::Credentials::new("chat", "hunter2")),
            Arc::new(Script::default()),
        );
        let debug = format!("{manager:?}");
        assert!(debug.contains("localhost:3306"));
        assert!(!debug.contains("hunter2"));
    }
}
