//! Statement registry.
//!
//! Every datastore operation is named by a [`Statement`]; the registry maps
//! it to the prepared-statement text. The registry is built once and shared
//! read-only by every pooled connection.

use std::fmt;

use hashbrown::HashMap;

/// Table holding login identities.
pub const AUTH_TABLE: &str = "Authentication";
/// Table holding user profiles.
pub const PROFILE_TABLE: &str = "UserProfile";

/// Logical datastore operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statement {
    /// Liveness probe.
    HeartBeat,
    /// Identity by username and email.
    FindExistingUser,
    /// Insert a new identity.
    CreateNewUser,
    /// Change the password of an identity.
    UpdateUserPassword,
    /// Identity by username and password.
    UserLoginCheck,
    /// Identity by uuid.
    UserUuidCheck,
    /// Profile by uuid.
    UserProfile,
}

impl Statement {
    /// Every statement, in registration order.
    pub const ALL: [Statement; 7] = [
        Statement::HeartBeat,
        Statement::FindExistingUser,
        Statement::CreateNewUser,
        Statement::UpdateUserPassword,
        Statement::UserLoginCheck,
        Statement::UserUuidCheck,
        Statement::UserProfile,
    ];

    /// Stable name used in log events.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::HeartBeat => "heart_beat",
            Self::FindExistingUser => "find_existing_user",
            Self::CreateNewUser => "create_new_user",
            Self::UpdateUserPassword => "update_user_password",
            Self::UserLoginCheck => "user_login_check",
            Self::UserUuidCheck => "user_uuid_check",
            Self::UserProfile => "user_profile",
        }
    }

    /// Number of bind parameters the standard template expects.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Self::HeartBeat => 0,
            Self::UserUuidCheck | Self::UserProfile => 1,
            Self::FindExistingUser | Self::UserLoginCheck => 2,
            Self::CreateNewUser | Self::UpdateUserPassword => 3,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Map from [`Statement`] to its prepared-statement text.
#[derive(Debug, Clone, Default)]
pub struct StatementRegistry {
    templates: HashMap<Statement, String>,
}

impl StatementRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The chat backend's statements against the identity and profile tables.
    #[must_use]
    pub fn standard() -> Self {
        let select_auth = |a: &str, b: Option<&str>| match b {
            Some(b) => format!("SELECT * FROM {AUTH_TABLE} WHERE {a} = ? AND {b} = ?"),
            None => format!("SELECT * FROM {AUTH_TABLE} WHERE {a} = ?"),
        };

        Self::new()
            .register(Statement::HeartBeat, "SELECT 1")
            .register(
                Statement::FindExistingUser,
                select_auth("username", Some("email")),
            )
            .register(
                Statement::CreateNewUser,
                format!("INSERT INTO {AUTH_TABLE} (username, password, email) VALUES (?, ?, ?)"),
            )
            .register(
                Statement::UpdateUserPassword,
                format!("UPDATE {AUTH_TABLE} SET password = ? WHERE username = ? AND email = ?"),
            )
            .register(
                Statement::UserLoginCheck,
                select_auth("username", Some("password")),
            )
            .register(Statement::UserUuidCheck, select_auth("uuid", None))
            .register(
                Statement::UserProfile,
                format!("SELECT * FROM {PROFILE_TABLE} WHERE uuid = ?"),
            )
    }

    /// Add or replace a template.
    #[must_use]
    pub fn register(mut self, statement: Statement, template: impl Into<String>) -> Self {
        self.templates.insert(statement, template.into());
        self
    }

    /// Template for a statement.
    #[must_use]
    pub fn lookup(&self, statement: Statement) -> Option<&str> {
        self.templates.get(&statement).map(String::as_str)
    }

    /// Which statement a template belongs to.
    #[must_use]
    pub fn identify(&self, sql: &str) -> Option<Statement> {
        self.templates
            .iter()
            .find_map(|(statement, template)| (template == sql).then_some(*statement))
    }

    /// Number of registered templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether no templates are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
