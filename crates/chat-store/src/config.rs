//! Datastore connection configuration.

use std::fmt;
use std::time::Duration;

use chat_pool::PoolConfig;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Default datastore port.
pub const DEFAULT_PORT: u16 = 3306;

/// Username and password for the datastore.
#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for connecting to the datastore.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname or IP address.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Database (schema) name.
    pub database: String,

    /// Authentication credentials.
    pub credentials: Credentials,

    /// Connection timeout.
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            database: String::new(),
            credentials: Credentials::default(),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `key=value;` connection string.
    ///
    /// ```text
    /// Server=db.internal,3306;Database=chat;User Id=chat;Password=secret;
    /// ```
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        let mut config = Self::default();

        for part in conn_str.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("invalid key-value: {part}")))?;

            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "server" | "host" | "data source" => match value.split_once([',', ':']) {
                    Some((host, port)) => {
                        config.host = host.to_string();
                        config.port = parse_port(port)?;
                    }
                    None => config.host = value.to_string(),
                },
                "port" => config.port = parse_port(value)?,
                "database" | "initial catalog" => config.database = value.to_string(),
                "user id" | "uid" | "user" | "username" => {
                    config.credentials.username = value.to_string();
                }
                "password" | "pwd" => config.credentials.password = value.to_string(),
                "connect timeout" | "connection timeout" => {
                    let secs: u64 = value
                        .parse()
                        .map_err(|_| Error::Config(format!("invalid timeout: {value}")))?;
                    config.connect_timeout = Duration::from_secs(secs);
                }
                _ => {
                    // Ignore unknown options for forward compatibility
                    tracing::debug!(key = key, "ignoring unknown connection string option");
                }
            }
        }

        Ok(config)
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `host:port`, for log fields.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_port(value: &str) -> Result<u16> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid port: {value}")))
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_pool_size() -> u32 {
    8
}

fn default_timeout_secs() -> u64 {
    60
}

/// The datastore section of a server settings file.
///
/// ```json
/// {
///   "host": "db.internal",
///   "port": 3306,
///   "username": "chat",
///   "password": "secret",
///   "database": "chat",
///   "timeout": 60,
///   "pool_size": 8
/// }
/// ```
///
/// `timeout` is both the health-check interval and the idle time after
/// which a connection is probed.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    /// Server host.
    pub host: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Credentials.
    #[serde(flatten)]
    pub credentials: Credentials,
    /// Database name.
    pub database: String,
    /// Health-check interval and idle timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,
    /// Number of pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Acquire deadline in seconds; absent means wait indefinitely.
    #[serde(default)]
    pub acquire_timeout: Option<u64>,
}

impl StoreSettings {
    /// Parse settings from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Connection configuration described by these settings.
    #[must_use]
    pub fn connection_config(&self) -> Config {
        Config::new()
            .host(self.host.clone())
            .port(self.port)
            .database(self.database.clone())
            .credentials(self.credentials.clone())
    }

    /// Pool configuration described by these settings.
    #[must_use]
    pub fn pool_config(&self) -> PoolConfig {
        let timeout = Duration::from_secs(self.timeout);
        PoolConfig::new()
            .pool_size(self.pool_size)
            .health_check_interval(timeout)
            .idle_timeout(timeout)
            .connection_timeout(self.acquire_timeout.map(Duration::from_secs))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_string_parsing() {
        let config = Config::from_connection_string(
            "Server=localhost;Database=chat;User Id=chat;Password=secret;",
        )
        .unwrap();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.database, "chat");
        assert_eq!(config.credentials, Credentials::new("chat", "secret"));
    }

    #[test]
    fn test_connection_string_with_port() {
        let config = Config::from_connection_string("Server=db.internal,3307;").unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 3307);

        let config = Config::from_connection_string("host=db.internal:3308").unwrap();
        assert_eq!(config.port, 3308);
    }

    #[test]
    fn test_connection_string_ignores_unknown_keys() {
        let config = Config::from_connection_string(
            "Server=localhost;Application Name=chat-server;Charset=utf8mb4;Database=chat",
        )
        .unwrap();
        assert_eq!(config.database, "chat");
        assert_eq!(config.endpoint(), "localhost:3306");
    }

    #[test]
    fn test_connection_string_errors() {
        assert!(Config::from_connection_string("Server").is_err());
        assert!(Config::from_connection_string("Port=http").is_err());
        assert!(Config::from_connection_string("Connect Timeout=soon").is_err());
    }

    #[test]
    fn test_password_is_redacted() {
        let creds = Credentials::new("chat", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn test_settings_document() {
        let settings = StoreSettings::from_json(
            r#"{"host":"db.internal","username":"chat","password":"pw","database":"chat","timeout":30,"pool_size":4}"#,
        )
        .unwrap();

        let config = settings.connection_config();
        assert_eq!(config.endpoint(), "db.internal:3306");
        assert_eq!(config.credentials.username, "chat");

        let pool = settings.pool_config();
        assert_eq!(pool.pool_size, 4);
        assert_eq!(pool.idle_timeout, Duration::from_secs(30));
        assert_eq!(pool.health_check_interval, Duration::from_secs(30));
        assert_eq!(pool.connection_timeout, None);
        assert!(pool.validate().is_ok());
    }

    #[test]
    fn test_settings_missing_field() {
        assert!(StoreSettings::from_json(r#"{"host":"db"}"#).is_err());
    }
}
