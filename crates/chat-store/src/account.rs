//! Account operations built on [`Connection::execute`].

use crate::connection::Connection;
use crate::lookup::Lookup;
use crate::row::Row;
use crate::statement::Statement;
use crate::value::Value;

/// Identity fields carried by registration and password-change requests.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountRequest {
    /// Login name.
    pub username: String,
    /// Password (new password, for a password change).
    pub password: String,
    /// Contact email.
    pub email: String,
}

impl AccountRequest {
    /// Create a request.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: email.into(),
        }
    }
}

impl std::fmt::Debug for AccountRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

/// Whether a username and email pair can be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// No identity uses the pair.
    Available,
    /// An identity already uses the pair.
    Taken,
    /// The datastore could not answer.
    Unknown,
}

/// Outcome of [`Connection::register_new_user`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The identity was created with this uuid.
    Created(u64),
    /// The username and email pair is already registered.
    Taken,
    /// The datastore failed part way.
    Failed,
}

/// Outcome of [`Connection::alter_user_password`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordChange {
    /// The password was updated.
    Changed,
    /// No identity matches the username and email.
    UnknownIdentity,
    /// The datastore failed.
    Failed,
}

impl Connection {
    /// Number of identities matching a username and password.
    pub async fn check_account_login(&mut self, username: &str, password: &str) -> Lookup<usize> {
        self.execute(
            Statement::UserLoginCheck,
            &[Value::from(username), Value::from(password)],
        )
        .await
        .map(|rs| rs.len())
    }

    /// Whether a username and email pair is free.
    pub async fn check_account_availability(&mut self, username: &str, email: &str) -> Availability {
        match self.find_existing_user(username, email).await {
            Lookup::Found(_) => Availability::Taken,
            Lookup::NotFound => Availability::Available,
            Lookup::Failed => Availability::Unknown,
        }
    }

    /// Create an identity and return its generated uuid.
    ///
    /// The insert and the uuid read-back are separate round-trips. Two
    /// concurrent registrations of the same pair are settled by the
    /// datastore's uniqueness constraint: the loser's insert fails and is
    /// reported as [`Registration::Taken`].
    pub async fn register_new_user(&mut self, request: &AccountRequest) -> Registration {
        match self
            .check_account_availability(&request.username, &request.email)
            .await
        {
            Availability::Available => {}
            Availability::Taken => return Registration::Taken,
            Availability::Unknown => return Registration::Failed,
        }

        let inserted = self
            .execute(
                Statement::CreateNewUser,
                &[
                    Value::from(request.username.as_str()),
                    Value::from(request.password.as_str()),
                    Value::from(request.email.as_str()),
                ],
            )
            .await;

        if inserted.is_failed() {
            // Lost a race against another registration, or the datastore is down.
            return match self
                .check_account_availability(&request.username, &request.email)
                .await
            {
                Availability::Taken => Registration::Taken,
                Availability::Available | Availability::Unknown => Registration::Failed,
            };
        }

        match self.find_existing_user(&request.username, &request.email).await {
            Lookup::Found(row) => match row.get::<u64>(0) {
                Ok(uuid) => {
                    tracing::info!(username = %request.username, uuid, "registered new user");
                    Registration::Created(uuid)
                }
                Err(err) => {
                    tracing::error!(username = %request.username, error = %err, "unreadable uuid for new user");
                    Registration::Failed
                }
            },
            Lookup::NotFound | Lookup::Failed => Registration::Failed,
        }
    }

    /// Replace the password of an existing identity.
    pub async fn alter_user_password(&mut self, request: &AccountRequest) -> PasswordChange {
        match self
            .check_account_availability(&request.username, &request.email)
            .await
        {
            Availability::Taken => {}
            Availability::Available => return PasswordChange::UnknownIdentity,
            Availability::Unknown => return PasswordChange::Failed,
        }

        let updated = self
            .execute(
                Statement::UpdateUserPassword,
                &[
                    Value::from(request.password.as_str()),
                    Value::from(request.username.as_str()),
                    Value::from(request.email.as_str()),
                ],
            )
            .await;

        if updated.succeeded() {
            PasswordChange::Changed
        } else {
            PasswordChange::Failed
        }
    }

    /// Identity row for a uuid.
    pub async fn check_uuid(&mut self, uuid: u64) -> Lookup<Row> {
        self.execute(Statement::UserUuidCheck, &[Value::UInt(uuid)])
            .await
            .and_then(|rs| Lookup::from(rs.into_iter().next()))
    }

    /// Profile row for a uuid.
    pub async fn user_profile(&mut self, uuid: u64) -> Lookup<Row> {
        self.execute(Statement::UserProfile, &[Value::UInt(uuid)])
            .await
            .and_then(|rs| Lookup::from(rs.into_iter().next()))
    }

    async fn find_existing_user(&mut self, username: &str, email: &str) -> Lookup<Row> {
        self.execute(
            Statement::FindExistingUser,
            &[Value::from(username), Value::from(email)],
        )
        .await
        .and_then(|rs| Lookup::from(rs.into_iter().next()))
    }
}
