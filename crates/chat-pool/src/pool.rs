//! Connection pool implementation.
//!
//! The pool owns a fixed number of connections. Callers borrow them through
//! [`PooledConnection`] guards, which put the connection back when dropped.
//! The available queue is the only transfer point of ownership: a connection
//! is either in the queue or held by exactly one guard.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::health::{self, SweepReport};
use crate::lifecycle::{ConnectionLifecycle, ConnectionMetadata};

/// A bounded pool of connections produced by a [`ConnectionLifecycle`].
///
/// `Pool` is a cheap handle; clones share the same connections.
///
/// # Features
///
/// - Eager fill to a fixed size; opening failures are reported, not retried
/// - FIFO hand-out (oldest idle first)
/// - Optional acquire deadline
/// - Background health check that replaces connections failing a probe
/// - Orderly shutdown that wakes every waiter and joins the health check
///
/// # Example
///
/// ```rust,ignore
/// use chat_pool::Pool;
///
/// let pool = Pool::builder(manager)
///     .pool_size(4)
///     .build()
///     .await?;
///
/// let mut conn = pool.get().await?;
/// // Use connection...
/// drop(conn); // back in the pool
///
/// pool.shutdown().await?;
/// ```
pub struct Pool<L: ConnectionLifecycle> {
    inner: Arc<PoolInner<L>>,
}

pub(crate) struct PoolInner<L: ConnectionLifecycle> {
    /// Pool configuration.
    pub(crate) config: PoolConfig,

    /// Opens, probes and closes connections.
    pub(crate) lifecycle: L,

    /// Whether the pool is closed. Only written while `idle` is locked.
    closed: AtomicBool,

    /// Connections waiting to be borrowed.
    idle: Mutex<VecDeque<Slot<L::Connection>>>,

    /// Signalled when a connection is queued or the pool closes.
    available: Notify,

    /// Connections that exist, idle or borrowed.
    live: AtomicU32,

    /// Counter for generating connection IDs.
    next_connection_id: AtomicU64,

    /// When the pool was created.
    created_at: Instant,

    /// Pool metrics.
    metrics: Mutex<PoolMetricsInner>,

    /// Serializes health-check sweeps against each other.
    pub(crate) sweep_lock: tokio::sync::Mutex<()>,

    /// Cancels the health-check task.
    shutdown: CancellationToken,

    /// Health-check task, joined on shutdown.
    health_task: Mutex<Option<JoinHandle<Result<(), PoolError>>>>,
}

/// A connection together with its pool bookkeeping.
pub(crate) struct Slot<C> {
    conn: C,
    metadata: ConnectionMetadata,
}

/// Internal metrics tracking.
#[derive(Debug, Default)]
struct PoolMetricsInner {
    connections_created: u64,
    connections_closed: u64,
    checkouts_successful: u64,
    checkouts_failed: u64,
    connections_returned: u64,
    health_checks_performed: u64,
    health_checks_failed: u64,
    replacements: u64,
}

impl<L: ConnectionLifecycle> Pool<L> {
    /// Create a new pool builder around a lifecycle.
    #[must_use]
    pub fn builder(lifecycle: L) -> PoolBuilder<L> {
        PoolBuilder::new(lifecycle)
    }

    /// Create a pool and open all of its connections.
    ///
    /// If any connection fails to open, the ones already opened are closed
    /// and the error is returned: a pool that cannot reach its size is not
    /// started.
    pub async fn new(lifecycle: L, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let inner = Arc::new(PoolInner {
            config: config.clone(),
            lifecycle,
            closed: AtomicBool::new(false),
            idle: Mutex::new(VecDeque::with_capacity(config.pool_size as usize)),
            available: Notify::new(),
            live: AtomicU32::new(0),
            next_connection_id: AtomicU64::new(1),
            created_at: Instant::now(),
            metrics: Mutex::new(PoolMetricsInner::default()),
            sweep_lock: tokio::sync::Mutex::new(()),
            shutdown: CancellationToken::new(),
            health_task: Mutex::new(None),
        });

        for _ in 0..config.pool_size {
            match inner.open_connection().await {
                Ok(slot) => inner.idle.lock().push_back(slot),
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        opened = inner.live.load(Ordering::Acquire),
                        size = config.pool_size,
                        "could not fill connection pool"
                    );
                    inner.close();
                    return Err(err);
                }
            }
        }

        if config.health_check {
            let task = tokio::spawn(health::run(
                Arc::downgrade(&inner),
                inner.shutdown.clone(),
                config.health_check_interval,
            ));
            *inner.health_task.lock() = Some(task);
        }

        tracing::info!(
            size = config.pool_size,
            health_check_interval_secs = config.health_check_interval.as_secs(),
            idle_timeout_secs = config.idle_timeout.as_secs(),
            "connection pool created"
        );

        Ok(Self { inner })
    }

    /// Get a connection from the pool.
    ///
    /// Waits until a connection is returned if none is idle. The wait is
    /// bounded by [`PoolConfig::connection_timeout`] when one is set.
    /// Waiters are woken in the order they started waiting, but a caller
    /// that arrives while a connection is idle takes it without queueing.
    pub async fn get(&self) -> Result<PooledConnection<L>, PoolError> {
        let result = match self.inner.config.connection_timeout {
            Some(timeout) => self.wait_with_deadline(timeout).await,
            None => self.inner.acquire().await,
        };
        if result.is_err() {
            self.inner.metrics.lock().checkouts_failed += 1;
        }
        result
    }

    /// Get a connection, waiting at most `timeout`.
    pub async fn get_timeout(&self, timeout: Duration) -> Result<PooledConnection<L>, PoolError> {
        let result = self.wait_with_deadline(timeout).await;
        if result.is_err() {
            self.inner.metrics.lock().checkouts_failed += 1;
        }
        result
    }

    async fn wait_with_deadline(
        &self,
        timeout: Duration,
    ) -> Result<PooledConnection<L>, PoolError> {
        match tokio::time::timeout(timeout, self.inner.acquire()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(
                    timeout_ms = timeout.as_millis() as u64,
                    "timed out waiting for a connection"
                );
                Err(PoolError::Timeout)
            }
        }
    }

    /// Try to get a connection without waiting.
    ///
    /// Returns `None` if no connections are immediately available.
    pub fn try_get(&self) -> Result<Option<PooledConnection<L>>, PoolError> {
        match self.inner.try_take() {
            Ok(slot) => Ok(slot.map(|slot| PooledConnection::new(slot, Arc::clone(&self.inner)))),
            Err(err) => {
                self.inner.metrics.lock().checkouts_failed += 1;
                Err(err)
            }
        }
    }

    /// Run one health-check sweep now, without waiting for the interval.
    pub async fn run_health_check(&self) -> Result<SweepReport, PoolError> {
        health::sweep(&self.inner).await
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let available = self.inner.idle.lock().len() as u32;
        let total = self.inner.live.load(Ordering::Acquire);
        PoolStatus {
            available,
            in_use: total.saturating_sub(available),
            total,
            max: self.inner.config.pool_size,
        }
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let inner = self.inner.metrics.lock();
        PoolMetrics {
            connections_created: inner.connections_created,
            connections_closed: inner.connections_closed,
            checkouts_successful: inner.checkouts_successful,
            checkouts_failed: inner.checkouts_failed,
            connections_returned: inner.connections_returned,
            health_checks_performed: inner.health_checks_performed,
            health_checks_failed: inner.health_checks_failed,
            replacements: inner.replacements,
            uptime: self.inner.created_at.elapsed(),
        }
    }

    /// Shut the pool down.
    ///
    /// Every waiting caller is woken and gets [`PoolError::PoolClosed`], idle
    /// connections are closed, and the health-check task is stopped and
    /// joined. Borrowed connections are closed when their guards drop.
    ///
    /// Returns the fatal error that stopped the health check, if any.
    pub async fn shutdown(&self) -> Result<(), PoolError> {
        self.inner.close();

        let task = self.inner.health_task.lock().take();
        let result = match task {
            Some(task) => match task.await {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(error = %err, "health check task did not finish cleanly");
                    Ok(())
                }
            },
            None => Ok(()),
        };

        tracing::info!("connection pool closed");
        result
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Get the lifecycle the pool was built with.
    #[must_use]
    pub fn lifecycle(&self) -> &L {
        &self.inner.lifecycle
    }
}

impl<L: ConnectionLifecycle> Clone for Pool<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: ConnectionLifecycle> std::fmt::Debug for Pool<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<L: ConnectionLifecycle> PoolInner<L> {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Pop the oldest idle connection, or fail if the pool is closed.
    fn try_take(&self) -> Result<Option<Slot<L::Connection>>, PoolError> {
        let mut idle = self.idle.lock();
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }
        Ok(idle.pop_front())
    }

    /// Wait until a connection is idle or the pool closes.
    pub(crate) async fn acquire(self: &Arc<Self>) -> Result<PooledConnection<L>, PoolError> {
        tracing::trace!("acquiring connection from pool");
        loop {
            // Register interest before checking the queue so a release that
            // lands between the check and the await is not missed.
            let mut notified = std::pin::pin!(self.available.notified());
            notified.as_mut().enable();

            if let Some(slot) = self.try_take()? {
                return Ok(PooledConnection::new(slot, Arc::clone(self)));
            }

            notified.await;
        }
    }

    /// Open a connection through the lifecycle and count it as live.
    pub(crate) async fn open_connection(&self) -> Result<Slot<L::Connection>, PoolError> {
        let conn = self.lifecycle.connect().await.inspect_err(|err| {
            tracing::error!(error = %err, "failed to open pooled connection");
        })?;

        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_add(1, Ordering::AcqRel);
        self.metrics.lock().connections_created += 1;
        tracing::debug!(connection_id = id, "pooled connection opened");

        Ok(Slot {
            conn,
            metadata: ConnectionMetadata::new(id),
        })
    }

    /// Queue a connection and wake one waiter, or close it if the pool is closed.
    pub(crate) fn put_idle(&self, slot: Slot<L::Connection>) {
        {
            let mut idle = self.idle.lock();
            if !self.is_closed() {
                idle.push_back(slot);
                drop(idle);
                self.available.notify_one();
                return;
            }
        }
        self.discard(slot);
    }

    /// Give a borrowed connection back.
    fn release(&self, slot: Slot<L::Connection>) {
        tracing::trace!(connection_id = slot.metadata.id, "returning connection to pool");
        self.metrics.lock().connections_returned += 1;
        self.put_idle(slot);
    }

    /// Close a connection and stop counting it.
    fn discard(&self, slot: Slot<L::Connection>) {
        tracing::debug!(
            connection_id = slot.metadata.id,
            age_secs = slot.metadata.age().as_secs(),
            "closing pooled connection"
        );
        self.lifecycle.close(slot.conn);
        self.live.fetch_sub(1, Ordering::AcqRel);
        self.metrics.lock().connections_closed += 1;
    }

    /// Mark the pool closed, wake all waiters, and close idle connections.
    pub(crate) fn close(&self) {
        let drained: Vec<_> = {
            let mut idle = self.idle.lock();
            self.closed.store(true, Ordering::Release);
            idle.drain(..).collect()
        };
        self.shutdown.cancel();
        self.available.notify_waiters();
        for slot in drained {
            self.discard(slot);
        }
    }

    pub(crate) fn record_health_check(&self, healthy: bool) {
        let mut metrics = self.metrics.lock();
        metrics.health_checks_performed += 1;
        if !healthy {
            metrics.health_checks_failed += 1;
        }
    }

    pub(crate) fn record_replacement(&self) {
        self.metrics.lock().replacements += 1;
    }
}

impl<L: ConnectionLifecycle> Drop for PoolInner<L> {
    fn drop(&mut self) {
        self.shutdown.cancel();
        for slot in self.idle.get_mut().drain(..) {
            self.lifecycle.close(slot.conn);
        }
    }
}

/// Builder for creating a connection pool.
///
/// # Example
///
/// ```rust,ignore
/// let pool = Pool::builder(manager)
///     .pool_config(pool_config)
///     .build()
///     .await?;
/// ```
pub struct PoolBuilder<L: ConnectionLifecycle> {
    lifecycle: L,
    pool_config: PoolConfig,
}

impl<L: ConnectionLifecycle> PoolBuilder<L> {
    /// Create a new pool builder with default settings.
    pub fn new(lifecycle: L) -> Self {
        Self {
            lifecycle,
            pool_config: PoolConfig::default(),
        }
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Set the number of pooled connections.
    #[must_use]
    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_config.pool_size = size;
        self
    }

    /// Set the connection acquisition timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pool_config.connection_timeout = timeout;
        self
    }

    /// Set the idle time after which connections are probed.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.idle_timeout = timeout;
        self
    }

    /// Set the health-check interval.
    #[must_use]
    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.pool_config.health_check_interval = interval;
        self
    }

    /// Enable or disable the background health check.
    #[must_use]
    pub fn health_check(mut self, enabled: bool) -> Self {
        self.pool_config.health_check = enabled;
        self
    }

    /// Build the pool.
    pub async fn build(self) -> Result<Pool<L>, PoolError> {
        Pool::new(self.lifecycle, self.pool_config).await
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub available: u32,
    /// Number of connections currently in use.
    pub in_use: u32,
    /// Total number of connections.
    pub total: u32,
    /// Configured pool size.
    pub max: u32,
}

impl PoolStatus {
    /// Calculate the utilization percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        (self.in_use as f64 / self.max as f64) * 100.0
    }

    /// Check if the pool is at capacity.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.total >= self.max
    }
}

/// Metrics collected from the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Total connections created since pool start.
    pub connections_created: u64,
    /// Total connections closed since pool start.
    pub connections_closed: u64,
    /// Successful checkouts, including health-check borrows.
    pub checkouts_successful: u64,
    /// Failed checkouts (timeouts, pool closed).
    pub checkouts_failed: u64,
    /// Guards that handed their connection back.
    pub connections_returned: u64,
    /// Health probes performed.
    pub health_checks_performed: u64,
    /// Health probes that failed.
    pub health_checks_failed: u64,
    /// Connections replaced by the health check.
    pub replacements: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Calculate checkout success rate (0.0 to 1.0).
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            return 1.0;
        }
        self.checkouts_successful as f64 / total as f64
    }

    /// Calculate health check success rate (0.0 to 1.0).
    #[must_use]
    pub fn health_check_success_rate(&self) -> f64 {
        if self.health_checks_performed == 0 {
            return 1.0;
        }
        let successful = self.health_checks_performed - self.health_checks_failed;
        successful as f64 / self.health_checks_performed as f64
    }
}

/// A connection borrowed from the pool.
///
/// When dropped, the connection is returned to the pool exactly once. Use
/// [`retire()`](PooledConnection::retire) to close a connection known to be
/// broken instead of returning it.
pub struct PooledConnection<L: ConnectionLifecycle> {
    /// Always `Some` until the guard is dropped or retired.
    slot: Option<Slot<L::Connection>>,
    /// Reference to the pool for returning the connection.
    pool: Arc<PoolInner<L>>,
}

impl<L: ConnectionLifecycle> PooledConnection<L> {
    fn new(mut slot: Slot<L::Connection>, pool: Arc<PoolInner<L>>) -> Self {
        slot.metadata.mark_checked_out();
        pool.metrics.lock().checkouts_successful += 1;
        tracing::trace!(connection_id = slot.metadata.id, "connection checked out");
        Self {
            slot: Some(slot),
            pool,
        }
    }

    fn slot(&self) -> &Slot<L::Connection> {
        match &self.slot {
            Some(slot) => slot,
            None => unreachable!("pooled connection used after release"),
        }
    }

    fn slot_mut(&mut self) -> &mut Slot<L::Connection> {
        match &mut self.slot {
            Some(slot) => slot,
            None => unreachable!("pooled connection used after release"),
        }
    }

    /// Get the connection metadata.
    #[must_use]
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.slot().metadata
    }

    /// Close the connection instead of returning it to the pool.
    ///
    /// The pool's live count drops by one; the health check does not refill
    /// it, so callers use this only when a replacement follows.
    pub fn retire(mut self) {
        if let Some(slot) = self.slot.take() {
            tracing::debug!(connection_id = slot.metadata.id, "retiring connection");
            self.pool.discard(slot);
        }
    }
}

impl<L: ConnectionLifecycle> Deref for PooledConnection<L> {
    type Target = L::Connection;

    fn deref(&self) -> &Self::Target {
        &self.slot().conn
    }
}

impl<L: ConnectionLifecycle> DerefMut for PooledConnection<L> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.slot_mut().conn
    }
}

impl<L: ConnectionLifecycle> Drop for PooledConnection<L> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool.release(slot);
        }
    }
}

impl<L: ConnectionLifecycle> std::fmt::Debug for PooledConnection<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("metadata", &self.slot.as_ref().map(|slot| &slot.metadata))
            .finish()
    }
}
