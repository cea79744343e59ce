//! # chat-store
//!
//! Pooled datastore access for the chat backend.
//!
//! A [`Connection`] is one live session with the datastore. It runs
//! statements named by [`Statement`] and looked up in a shared
//! [`StatementRegistry`], and it knows how to prove it is still alive.
//! [`ConnectionManager`] plugs connections into a [`chat_pool::Pool`], which
//! bounds how many exist and replaces the ones that stop answering.
//!
//! ## Features
//!
//! - **Tri-state results**: "no rows" and "the datastore failed" are
//!   different answers ([`Lookup`])
//! - **Account operations**: login check, availability, registration,
//!   password change, uuid and profile lookup
//! - **Pluggable transport**: the wire protocol sits behind [`Driver`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use chat_store::{AccountRequest, StoreSettings, connect_pool};
//!
//! let settings = StoreSettings::from_json(&std::fs::read_to_string("store.json")?)?;
//! let pool = connect_pool(settings.connection_config(), settings.pool_config(), driver).await?;
//!
//! let mut conn = pool.get().await?;
//! let outcome = conn
//!     .register_new_user(&AccountRequest::new("alice", "secret", "alice@example.com"))
//!     .await;
//! drop(conn);
//!
//! pool.shutdown().await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod account;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod instrumentation;
pub mod lookup;
pub mod manager;
pub mod registry;
pub mod row;
pub mod statement;
pub mod value;

// Re-export commonly used types
pub use account::{AccountRequest, Availability, PasswordChange, Registration};
pub use config::{Config, Credentials, StoreSettings};
pub use connection::Connection;
pub use driver::{Driver, DriverError, Session};
pub use error::{Error, Result};
pub use lookup::Lookup;
pub use manager::{ConnectionManager, StoreGuard, StorePool, connect_pool};
pub use row::{Column, ResultSet, Row};
pub use statement::{Statement, StatementRegistry};
pub use value::{FromValue, Value};
