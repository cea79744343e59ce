//! A single live datastore connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::Config;
use crate::driver::{Driver, DriverError, Session, codes};
use crate::error::{Error, Result};
use crate::instrumentation::{DB_SYSTEM, StatementLog, operation_kind, targets};
use crate::lookup::Lookup;
use crate::row::ResultSet;
use crate::statement::{Statement, StatementRegistry};
use crate::value::Value;

/// One authenticated session with the datastore.
///
/// A `Connection` is connected for its whole life: [`connect`](Self::connect)
/// either returns a working session or an error, never a half-open value.
/// The session is closed when the connection is dropped.
pub struct Connection {
    session: Box<dyn Session>,
    statements: Arc<StatementRegistry>,
    last_activity: Instant,
    endpoint: String,
    statement_log: StatementLog,
}

impl Connection {
    /// Open a session.
    ///
    /// Failures are logged with the server's diagnostics and returned; the
    /// caller decides whether they are fatal.
    pub async fn connect(
        config: &Config,
        driver: &dyn Driver,
        statements: Arc<StatementRegistry>,
    ) -> Result<Self> {
        tracing::info!(
            target: targets::CONNECT,
            db_system = DB_SYSTEM,
            host = %config.host,
            port = config.port,
            database = %config.database,
            "connecting to datastore"
        );

        let session = match tokio::time::timeout(config.connect_timeout, driver.connect(config)).await
        {
            Ok(Ok(session)) => session,
            Ok(Err(err)) => return Err(connect_failed(config, err)),
            Err(_) => {
                let err = DriverError::new(
                    codes::CONN_HOST_ERROR,
                    format!("no answer within {}s", config.connect_timeout.as_secs()),
                );
                return Err(connect_failed(config, err));
            }
        };

        tracing::info!(
            target: targets::CONNECT,
            endpoint = %config.endpoint(),
            "datastore connection established"
        );

        Ok(Self {
            session,
            statements,
            last_activity: Instant::now(),
            endpoint: config.endpoint(),
            statement_log: StatementLog::default(),
        })
    }

    /// Run a registered statement.
    ///
    /// Never fails past this call: datastore errors are logged with the
    /// operation, error code and diagnostics, and reported as
    /// [`Lookup::Failed`]. A statement that succeeds without rows is
    /// [`Lookup::NotFound`].
    pub async fn execute(&mut self, statement: Statement, params: &[Value]) -> Lookup<ResultSet> {
        let Some(sql) = self.statements.lookup(statement) else {
            tracing::error!(
                target: targets::EXECUTE,
                operation = %statement,
                "no template registered for statement"
            );
            return Lookup::Failed;
        };

        tracing::debug!(
            target: targets::EXECUTE,
            operation = %statement,
            db_operation = operation_kind(sql),
            db_statement = %self.statement_log.render(sql),
            params = params.len(),
            "executing statement"
        );

        match self.session.execute(sql, params).await {
            Ok(result) => {
                self.touch();
                if result.is_empty() {
                    Lookup::NotFound
                } else {
                    Lookup::Found(result)
                }
            }
            Err(err) => {
                tracing::error!(
                    target: targets::EXECUTE,
                    operation = %statement,
                    endpoint = %self.endpoint,
                    code = err.code,
                    message = %err.message,
                    diagnostics = err.diagnostics.as_deref().unwrap_or(""),
                    "statement failed"
                );
                Lookup::Failed
            }
        }
    }

    /// Whether the connection is still usable.
    ///
    /// A connection active within `timeout` of `now` is assumed alive;
    /// otherwise a heartbeat statement decides.
    pub async fn probe(&mut self, now: Instant, timeout: Duration) -> bool {
        if now.saturating_duration_since(self.last_activity) <= timeout {
            return true;
        }
        self.execute(Statement::HeartBeat, &[]).await.is_found()
    }

    /// Record activity now.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// When the connection last completed a statement.
    #[must_use]
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// `host:port` of the datastore.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Close the session.
    pub fn close(self) {
        tracing::debug!(target: targets::CONNECT, endpoint = %self.endpoint, "closing datastore connection");
    }

    #[cfg(test)]
    pub(crate) fn backdate(&mut self, by: Duration) {
        if let Some(at) = self.last_activity.checked_sub(by) {
            self.last_activity = at;
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.session.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("idle", &self.last_activity.elapsed())
            .finish()
    }
}

fn connect_failed(config: &Config, err: DriverError) -> Error {
    tracing::error!(
        target: targets::CONNECT,
        host = %config.host,
        port = config.port,
        code = err.code,
        message = %err.message,
        diagnostics = err.diagnostics.as_deref().unwrap_or(""),
        "datastore connection failed"
    );
    Error::Connect {
        host: config.host.clone(),
        port: config.port,
        source: err,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Session that replays scripted answers and records what it ran.
    #[derive(Default, Clone)]
    pub(crate) struct Script {
        pub answers: Arc<Mutex<VecDeque<std::result::Result<ResultSet, DriverError>>>>,
        pub ran: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
        pub closed: Arc<Mutex<u32>>,
    }

    impl Script {
        pub fn answer(&self, answer: std::result::Result<ResultSet, DriverError>) -> &Self {
            self.answers.lock().unwrap().push_back(answer);
            self
        }

        pub fn ran(&self) -> Vec<String> {
            self.ran.lock().unwrap().iter().map(|(sql, _)| sql.clone()).collect()
        }
    }

    #[async_trait]
    impl Session for Script {
        async fn execute(
            &mut self,
            sql: &str,
            params: &[Value],
        ) -> std::result::Result<ResultSet, DriverError> {
            self.ran.lock().unwrap().push((sql.to_string(), params.to_vec()));
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ResultSet::empty()))
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() += 1;
        }
    }

    #[async_trait]
    impl Driver for Script {
        async fn connect(
            &self,
            config: &Config,
        ) -> std::result::Result<Box<dyn Session>, DriverError> {
            if config.credentials.password == "wrong" {
                return Err(DriverError::new(codes::ACCESS_DENIED, "Access denied"));
            }
            Ok(Box::new(self.clone()))
        }
    }

    pub(crate) async fn scripted() -> (Connection, Script) {
        let script = Script::default();
        let conn = Connection::connect(
            &Config::new().database("chat"),
            &script,
            Arc::new(StatementRegistry::standard()),
        )
        .await
        .unwrap();
        (conn, script)
    }

    pub(crate) fn one_row() -> ResultSet {
        ResultSet::new(["1"]).with_row([Value::Int(1)])
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let config = Config::new().credentials(crate::Credentials::new("chat", "wrong"));
        let err = Connection::connect(&config, &Script::default(), Arc::default())
            .await
            .unwrap_err();
        match err {
            Error::Connect { source, .. } => assert_eq!(source.code, codes::ACCESS_DENIED),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_execute_tri_state() {
        let (mut conn, script) = scripted().await;
        script
            .answer(Ok(one_row()))
            .answer(Ok(ResultSet::empty()))
            .answer(Err(DriverError::new(codes::PARSE_ERROR, "syntax")));

        assert!(conn.execute(Statement::HeartBeat, &[]).await.is_found());
        assert_eq!(
            conn.execute(Statement::UserUuidCheck, &[Value::UInt(9)]).await,
            Lookup::NotFound
        );
        assert_eq!(conn.execute(Statement::HeartBeat, &[]).await, Lookup::Failed);
        assert_eq!(script.ran()[0], "SELECT 1");
    }

    #[tokio::test]
    async fn test_unregistered_statement_fails_without_round_trip() {
        let script = Script::default();
        let mut conn = Connection::connect(&Config::new(), &script, Arc::default())
            .await
            .unwrap();
        assert_eq!(conn.execute(Statement::HeartBeat, &[]).await, Lookup::Failed);
        assert!(script.ran().is_empty());
    }

    #[tokio::test]
    async fn test_execute_touches_on_success_only() {
        let (mut conn, script) = scripted().await;
        conn.backdate(Duration::from_secs(120));
        let stale = conn.last_activity();

        script.answer(Err(DriverError::new(codes::SERVER_GONE, "gone")));
        let _ = conn.execute(Statement::HeartBeat, &[]).await;
        assert_eq!(conn.last_activity(), stale);

        let _ = conn.execute(Statement::HeartBeat, &[]).await;
        assert!(conn.last_activity() > stale);
    }

    #[tokio::test]
    async fn test_probe_skips_heartbeat_when_recent() {
        let (mut conn, script) = scripted().await;
        assert!(conn.probe(Instant::now(), Duration::from_secs(60)).await);
        assert!(script.ran().is_empty());
    }

    #[tokio::test]
    async fn test_probe_sends_heartbeat_when_stale() {
        let (mut conn, script) = scripted().await;
        conn.backdate(Duration::from_secs(120));

        script.answer(Ok(one_row()));
        assert!(conn.probe(Instant::now(), Duration::from_secs(60)).await);

        conn.backdate(Duration::from_secs(120));
        script.answer(Err(DriverError::new(codes::SERVER_GONE, "gone")));
        assert!(!conn.probe(Instant::now(), Duration::from_secs(60)).await);
        assert_eq!(script.ran(), vec!["SELECT 1", "SELECT 1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_staleness_follows_runtime_clock() {
        let (mut conn, script) = scripted().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(conn.probe(Instant::now(), Duration::from_secs(60)).await);
        assert!(script.ran().is_empty());

        tokio::time::advance(Duration::from_secs(1)).await;
        script.answer(Ok(one_row()));
        assert!(conn.probe(Instant::now(), Duration::from_secs(60)).await);
        assert_eq!(script.ran(), vec!["SELECT 1"]);
        assert_eq!(conn.last_activity(), Instant::now());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_statement_log_fields() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _default = tracing::subscriber::set_default(subscriber);

        let (mut conn, script) = scripted().await;
        script.answer(Ok(one_row()));
        assert!(conn.execute(Statement::UserUuidCheck, &[Value::UInt(3)]).await.is_found());

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("db_system=\"mysql\""), "{output}");
        assert!(output.contains("db_operation=\"SELECT\""), "{output}");
        assert!(output.contains("db_statement=SELECT * FROM Authentication"), "{output}");
    }

    #[tokio::test]
    async fn test_drop_closes_session_once() {
        let (conn, script) = scripted().await;
        conn.close();
        assert_eq!(*script.closed.lock().unwrap(), 1);
    }
}
