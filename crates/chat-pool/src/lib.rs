//! # chat-pool
//!
//! Bounded connection pool with background health checking.
//!
//! The pool owns a fixed number of connections to a stateful backend, lends
//! them out through scoped guards, and periodically probes idle connections,
//! replacing the ones that no longer answer. It is generic over the backend:
//! a [`ConnectionLifecycle`] says how to open, probe, and close one kind of
//! connection.
//!
//! ## Features
//!
//! - Eager fill to a fixed size; never more connections than configured
//! - FIFO hand-out with an optional acquire deadline
//! - Guards return their connection exactly once, on every exit path
//! - Health-check sweeps borrow through the same path as callers
//! - Shutdown wakes all waiters and joins the health-check task
//!
//! ## Example
//!
//! ```rust,ignore
//! use chat_pool::{Pool, PoolConfig};
//! use std::time::Duration;
//!
//! let config = PoolConfig::new()
//!     .pool_size(8)
//!     .idle_timeout(Duration::from_secs(60))
//!     .health_check_interval(Duration::from_secs(60));
//!
//! let pool = Pool::new(manager, config).await?;
//!
//! // Get a connection from the pool
//! let conn = pool.get().await?;
//! // Use connection...
//! // Connection automatically returned to pool on drop
//!
//! // Check pool status
//! let status = pool.status();
//! println!("Pool utilization: {:.1}%", status.utilization());
//!
//! pool.shutdown().await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod pool;

// Configuration
pub use config::PoolConfig;

// Error types
pub use error::PoolError;

// Pool types
pub use health::SweepReport;
pub use pool::{Pool, PoolBuilder, PoolMetrics, PoolStatus, PooledConnection};

// Lifecycle management
pub use lifecycle::{ConnectionLifecycle, ConnectionMetadata, HealthCheckResult};
