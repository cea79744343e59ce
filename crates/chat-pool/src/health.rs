//! Background health checking.
//!
//! A sweep borrows idle connections through the normal acquire path, probes
//! each one, and swaps any that fail for a freshly opened connection. Going
//! through [`PooledConnection`](crate::PooledConnection) keeps every
//! ownership transfer on the same code path as ordinary callers.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::PoolError;
use crate::lifecycle::{ConnectionLifecycle, HealthCheckResult};
use crate::pool::PoolInner;

/// Summary of one health-check sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Connections probed.
    pub probed: u32,
    /// Connections that failed and were replaced.
    pub replaced: u32,
}

/// Health-check loop. Exits on cancellation, pool close, or when the pool
/// has been dropped.
///
/// A replacement that cannot be opened closes the pool and ends the loop
/// with the error, which [`Pool::shutdown`](crate::Pool::shutdown) reports.
pub(crate) async fn run<L: ConnectionLifecycle>(
    pool: Weak<PoolInner<L>>,
    shutdown: CancellationToken,
    interval: Duration,
) -> Result<(), PoolError> {
    tracing::debug!(interval_secs = interval.as_secs(), "health check task started");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }

        let Some(inner) = pool.upgrade() else { break };
        if inner.is_closed() {
            break;
        }

        let started = Instant::now();
        match sweep(&inner).await {
            Ok(report) => {
                tracing::debug!(
                    probed = report.probed,
                    replaced = report.replaced,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "health check sweep completed"
                );
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    "health check could not replace a connection, closing pool"
                );
                inner.close();
                return Err(err);
            }
        }
    }

    tracing::debug!("health check task stopped");
    Ok(())
}

/// Probe every connection that is idle when the sweep starts.
///
/// Connections are borrowed one at a time. If the pool stays fully borrowed
/// for a whole interval, the sweep ends early rather than stall.
pub(crate) async fn sweep<L: ConnectionLifecycle>(
    inner: &Arc<PoolInner<L>>,
) -> Result<SweepReport, PoolError> {
    let _round = inner.sweep_lock.lock().await;
    let mut report = SweepReport::default();

    let snapshot = inner.idle_count();
    let wait = inner.config.health_check_interval;
    let idle_timeout = inner.config.idle_timeout;

    for _ in 0..snapshot {
        let mut conn = match tokio::time::timeout(wait, inner.acquire()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(PoolError::PoolClosed)) => return Ok(report),
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                tracing::debug!("all connections busy, ending health check sweep early");
                break;
            }
        };

        let old_id = conn.metadata().id;
        let result = inner
            .lifecycle
            .health_check(&mut conn, Instant::now(), idle_timeout)
            .await;
        inner.record_health_check(result.is_healthy());
        report.probed += 1;

        if let HealthCheckResult::Unhealthy { reason } = result {
            tracing::warn!(
                connection_id = old_id,
                reason = %reason,
                "connection failed health check"
            );
            conn.retire();

            let fresh = inner.open_connection().await?;
            inner.record_replacement();
            report.replaced += 1;
            tracing::info!(
                old_connection_id = old_id,
                "replaced connection after failed health check"
            );
            inner.put_idle(fresh);
        }
    }

    Ok(report)
}
