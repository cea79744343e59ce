//! # chat-testing
//!
//! Test infrastructure for the chat backend's datastore layer.
//!
//! [`MemoryServer`] is a datastore that lives in process memory and speaks
//! the standard statement set, so pools and account operations can be
//! exercised without a running database. Faults can be switched on at
//! runtime: refused logins, failing heartbeats, failing queries, severed
//! sessions, and per-statement latency.
//!
//! ## Example
//!
//! ```rust,ignore
//! use chat_testing::{MemoryServer, memory_pool};
//! use chat_pool::PoolConfig;
//!
//! let server = MemoryServer::new();
//! let pool = memory_pool(&server, PoolConfig::new().pool_size(2)).await?;
//! assert_eq!(server.live(), 2);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod server;

pub use server::{Account, MemoryServer, MemorySession, Profile, WRONG_ARGUMENTS};

use chat_pool::{PoolConfig, PoolError};
use chat_store::{Config, Credentials, StorePool, connect_pool};

/// Connection configuration pointing at an in-memory server.
#[must_use]
pub fn memory_config() -> Config {
    Config::new()
        .host("memory")
        .database("chat")
        .credentials(Credentials::new("chat", "chat"))
}

/// Build a datastore pool backed by `server`.
pub async fn memory_pool(server: &MemoryServer, config: PoolConfig) -> Result<StorePool, PoolError> {
    connect_pool(memory_config(), config, server.driver()).await
}
