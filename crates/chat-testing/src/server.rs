//! In-memory datastore.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chat_store::driver::codes;
use chat_store::{
    Config, Driver, DriverError, FromValue, ResultSet, Session, Statement, StatementRegistry, Value,
};
use parking_lot::Mutex;

/// Server error code for a bind parameter of the wrong type or count.
pub const WRONG_ARGUMENTS: u16 = 1210;

/// One row of the `Authentication` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Generated identifier.
    pub uuid: u64,
    /// Login name.
    pub username: String,
    /// Password.
    pub password: String,
    /// Contact email.
    pub email: String,
}

/// One row of the `UserProfile` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Owner's uuid.
    pub uuid: u64,
    /// Display name.
    pub nickname: String,
    /// Free-form description.
    pub description: String,
}

#[derive(Debug, Default)]
struct Tables {
    accounts: Vec<Account>,
    profiles: Vec<Profile>,
}

#[derive(Debug, Default)]
struct Faults {
    refuse_connects: AtomicBool,
    fail_heartbeats: AtomicBool,
    fail_queries: AtomicBool,
    severed: Mutex<Vec<u64>>,
    latency: Mutex<Option<Duration>>,
}

#[derive(Debug, Default)]
struct Counters {
    connects: AtomicU32,
    live: AtomicU32,
    closes: AtomicU32,
    statements: AtomicU32,
}

#[derive(Debug)]
struct Shared {
    statements: StatementRegistry,
    tables: Mutex<Tables>,
    next_uuid: AtomicU64,
    next_session: AtomicU64,
    faults: Faults,
    counters: Counters,
}

/// A datastore that lives in process memory.
///
/// It understands the standard statement templates against the
/// `Authentication` and `UserProfile` tables and enforces uniqueness of the
/// username and email pair. Clones share the same tables.
#[derive(Debug, Clone)]
pub struct MemoryServer {
    shared: Arc<Shared>,
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryServer {
    /// An empty server.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                statements: StatementRegistry::standard(),
                tables: Mutex::new(Tables::default()),
                next_uuid: AtomicU64::new(1),
                next_session: AtomicU64::new(1),
                faults: Faults::default(),
                counters: Counters::default(),
            }),
        }
    }

    /// This server as a [`Driver`].
    #[must_use]
    pub fn driver(&self) -> Arc<dyn Driver> {
        Arc::new(self.clone())
    }

    /// Insert an account directly, bypassing statements.
    pub fn seed_account(&self, username: &str, password: &str, email: &str) -> u64 {
        let mut tables = self.shared.tables.lock();
        self.insert(&mut tables, username, password, email)
    }

    /// Snapshot of the `Authentication` table.
    #[must_use]
    pub fn accounts(&self) -> Vec<Account> {
        self.shared.tables.lock().accounts.clone()
    }

    /// Reject new sessions with an access-denied error.
    pub fn refuse_connects(&self, refuse: bool) {
        self.shared.faults.refuse_connects.store(refuse, Ordering::SeqCst);
    }

    /// Fail every heartbeat statement.
    pub fn fail_heartbeats(&self, fail: bool) {
        self.shared.faults.fail_heartbeats.store(fail, Ordering::SeqCst);
    }

    /// Fail every statement other than heartbeats.
    pub fn fail_queries(&self, fail: bool) {
        self.shared.faults.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Drop one session from the server side. Every later statement on it
    /// fails with "server has gone away".
    pub fn sever(&self, session_id: u64) {
        self.shared.faults.severed.lock().push(session_id);
    }

    /// Delay every statement by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.shared.faults.latency.lock() = latency;
    }

    /// Sessions opened so far.
    #[must_use]
    pub fn connects(&self) -> u32 {
        self.shared.counters.connects.load(Ordering::SeqCst)
    }

    /// Sessions currently open.
    #[must_use]
    pub fn live(&self) -> u32 {
        self.shared.counters.live.load(Ordering::SeqCst)
    }

    /// Sessions closed so far.
    #[must_use]
    pub fn closes(&self) -> u32 {
        self.shared.counters.closes.load(Ordering::SeqCst)
    }

    /// Statements received so far, including failed ones.
    #[must_use]
    pub fn statements(&self) -> u32 {
        self.shared.counters.statements.load(Ordering::SeqCst)
    }

    fn insert(&self, tables: &mut Tables, username: &str, password: &str, email: &str) -> u64 {
        let uuid = self.shared.next_uuid.fetch_add(1, Ordering::SeqCst);
        tables.accounts.push(Account {
            uuid,
            username: username.to_string(),
            password: password.to_string(),
            email: email.to_string(),
        });
        tables.profiles.push(Profile {
            uuid,
            nickname: username.to_string(),
            description: String::new(),
        });
        uuid
    }

    fn run(&self, session_id: u64, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError> {
        self.shared.counters.statements.fetch_add(1, Ordering::SeqCst);
        let faults = &self.shared.faults;

        if faults.severed.lock().contains(&session_id) {
            return Err(DriverError::new(codes::SERVER_GONE, "MySQL server has gone away"));
        }

        let Some(statement) = self.shared.statements.identify(sql) else {
            return Err(DriverError::new(
                codes::PARSE_ERROR,
                "You have an error in your SQL syntax",
            )
            .with_diagnostics(format!("near '{sql}'")));
        };

        if params.len() != statement.arity() {
            return Err(wrong_arguments(statement));
        }

        if statement == Statement::HeartBeat {
            if faults.fail_heartbeats.load(Ordering::SeqCst) {
                return Err(DriverError::new(codes::SERVER_GONE, "Lost connection during query"));
            }
            return Ok(ResultSet::new(["1"]).with_row([Value::Int(1)]));
        }

        if faults.fail_queries.load(Ordering::SeqCst) {
            return Err(DriverError::new(codes::SERVER_GONE, "Lost connection during query"));
        }

        let mut tables = self.shared.tables.lock();
        match statement {
            Statement::FindExistingUser => {
                let (username, email) = (text(statement, &params[0])?, text(statement, &params[1])?);
                Ok(account_rows(
                    tables
                        .accounts
                        .iter()
                        .filter(|a| a.username == username && a.email == email),
                ))
            }
            Statement::UserLoginCheck => {
                let (username, password) =
                    (text(statement, &params[0])?, text(statement, &params[1])?);
                Ok(account_rows(
                    tables
                        .accounts
                        .iter()
                        .filter(|a| a.username == username && a.password == password),
                ))
            }
            Statement::UserUuidCheck => {
                let uuid = id(statement, &params[0])?;
                Ok(account_rows(tables.accounts.iter().filter(|a| a.uuid == uuid)))
            }
            Statement::UserProfile => {
                let uuid = id(statement, &params[0])?;
                let mut rows = ResultSet::new(["uuid", "nickname", "description"]);
                for p in tables.profiles.iter().filter(|p| p.uuid == uuid) {
                    rows.push_row([
                        Value::UInt(p.uuid),
                        Value::from(p.nickname.as_str()),
                        Value::from(p.description.as_str()),
                    ]);
                }
                Ok(rows)
            }
            Statement::CreateNewUser => {
                let username = text(statement, &params[0])?;
                let password = text(statement, &params[1])?;
                let email = text(statement, &params[2])?;
                if tables
                    .accounts
                    .iter()
                    .any(|a| a.username == username && a.email == email)
                {
                    return Err(DriverError::new(
                        codes::DUPLICATE_ENTRY,
                        format!("Duplicate entry '{username}-{email}' for key 'identity'"),
                    ));
                }
                self.insert(&mut tables, &username, &password, &email);
                Ok(ResultSet::empty())
            }
            Statement::UpdateUserPassword => {
                let password = text(statement, &params[0])?;
                let username = text(statement, &params[1])?;
                let email = text(statement, &params[2])?;
                for account in tables
                    .accounts
                    .iter_mut()
                    .filter(|a| a.username == username && a.email == email)
                {
                    account.password.clone_from(&password);
                }
                Ok(ResultSet::empty())
            }
            Statement::HeartBeat => Ok(ResultSet::empty()),
        }
    }
}

fn account_rows<'a>(accounts: impl Iterator<Item = &'a Account>) -> ResultSet {
    let mut rows = ResultSet::new(["uuid", "username", "password", "email"]);
    for a in accounts {
        rows.push_row([
            Value::UInt(a.uuid),
            Value::from(a.username.as_str()),
            Value::from(a.password.as_str()),
            Value::from(a.email.as_str()),
        ]);
    }
    rows
}

fn wrong_arguments(statement: Statement) -> DriverError {
    DriverError::new(
        WRONG_ARGUMENTS,
        format!("Incorrect arguments to {}", statement.name()),
    )
}

fn text(statement: Statement, value: &Value) -> Result<String, DriverError> {
    String::from_value(value).map_err(|_| wrong_arguments(statement))
}

fn id(statement: Statement, value: &Value) -> Result<u64, DriverError> {
    u64::from_value(value).map_err(|_| wrong_arguments(statement))
}

#[async_trait]
impl Driver for MemoryServer {
    async fn connect(&self, config: &Config) -> Result<Box<dyn Session>, DriverError> {
        if self.shared.faults.refuse_connects.load(Ordering::SeqCst) {
            return Err(DriverError::new(
                codes::ACCESS_DENIED,
                format!("Access denied for user '{}'", config.credentials.username),
            ));
        }

        let id = self.shared.next_session.fetch_add(1, Ordering::SeqCst);
        self.shared.counters.connects.fetch_add(1, Ordering::SeqCst);
        self.shared.counters.live.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(session_id = id, "memory session opened");

        Ok(Box::new(MemorySession {
            id,
            server: self.clone(),
            open: true,
        }))
    }
}

/// A session on a [`MemoryServer`].
#[derive(Debug)]
pub struct MemorySession {
    id: u64,
    server: MemoryServer,
    open: bool,
}

impl MemorySession {
    /// Server-assigned session id, starting at 1 in connect order.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError> {
        if !self.open {
            return Err(DriverError::new(codes::SERVER_GONE, "session is closed"));
        }
        let latency = *self.server.shared.faults.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.server.run(self.id, sql, params)
    }

    fn close(&mut self) {
        if std::mem::take(&mut self.open) {
            let counters = &self.server.shared.counters;
            counters.live.fetch_sub(1, Ordering::SeqCst);
            counters.closes.fetch_add(1, Ordering::SeqCst);
            tracing::trace!(session_id = self.id, "memory session closed");
        }
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn session(server: &MemoryServer) -> Box<dyn Session> {
        server.connect(&Config::new()).await.unwrap()
    }

    fn sql(statement: Statement) -> String {
        StatementRegistry::standard()
            .lookup(statement)
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_insert_then_find() {
        let server = MemoryServer::new();
        let mut s = session(&server).await;

        let params = [Value::from("alice"), Value::from("pw"), Value::from("a@x")];
        s.execute(&sql(Statement::CreateNewUser), &params).await.unwrap();
        let err = s.execute(&sql(Statement::CreateNewUser), &params).await.unwrap_err();
        assert_eq!(err.code, codes::DUPLICATE_ENTRY);

        let found = s
            .execute(&sql(Statement::FindExistingUser), &[Value::from("alice"), Value::from("a@x")])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found.first().unwrap().get::<u64>(0).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_sql_is_a_syntax_error() {
        let server = MemoryServer::new();
        let mut s = session(&server).await;
        let err = s.execute("DROP TABLE Authentication", &[]).await.unwrap_err();
        assert_eq!(err.code, codes::PARSE_ERROR);
        assert!(err.diagnostics.is_some());
    }

    #[tokio::test]
    async fn test_wrong_arity() {
        let server = MemoryServer::new();
        let mut s = session(&server).await;
        let err = s
            .execute(&sql(Statement::UserUuidCheck), &[])
            .await
            .unwrap_err();
        assert_eq!(err.code, WRONG_ARGUMENTS);
    }

    #[tokio::test]
    async fn test_faults() {
        let server = MemoryServer::new();
        let mut s = session(&server).await;

        server.fail_heartbeats(true);
        assert!(s.execute("SELECT 1", &[]).await.is_err());
        server.fail_heartbeats(false);
        assert!(s.execute("SELECT 1", &[]).await.is_ok());

        server.refuse_connects(true);
        let err = server.connect(&Config::new()).await.err().unwrap();
        assert_eq!(err.code, codes::ACCESS_DENIED);
    }

    #[tokio::test]
    async fn test_counters_close_once() {
        let server = MemoryServer::new();
        let mut s = session(&server).await;
        assert_eq!((server.connects(), server.live()), (1, 1));

        s.close();
        s.close();
        drop(s);
        assert_eq!((server.live(), server.closes()), (0, 1));
    }
}
