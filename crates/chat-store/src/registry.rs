//! Process-wide pool accessor.
//!
//! Prefer passing a [`StorePool`] handle to the components that need it.
//! This accessor exists for call sites that cannot be wired explicitly, such
//! as request handlers registered through a static table.

use chat_pool::PoolError;
use once_cell::sync::OnceCell;

use crate::manager::StorePool;

static GLOBAL: OnceCell<StorePool> = OnceCell::new();

/// Install the process-wide pool.
///
/// Only the first call succeeds; later calls hand the pool back.
pub fn install(pool: StorePool) -> Result<(), StorePool> {
    GLOBAL.set(pool)
}

/// The process-wide pool, if one was installed.
#[must_use]
pub fn global() -> Option<&'static StorePool> {
    GLOBAL.get()
}

/// Shut down the process-wide pool.
///
/// A no-op when nothing was installed. The pool stays installed but closed,
/// so later borrowers get [`PoolError::PoolClosed`].
pub async fn shutdown_global() -> Result<(), PoolError> {
    match GLOBAL.get() {
        Some(pool) => {
            tracing::info!("shutting down process-wide datastore pool");
            pool.shutdown().await
        }
        None => Ok(()),
    }
}
