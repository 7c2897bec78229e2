//! Core resource pool implementation

use crate::config::PoolConfiguration;
use crate::errors::{BoxError, PoolError, PoolResult, SharedError};
use crate::eviction::IdleEntry;
use crate::health::HealthStatus;
#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;
use crate::metrics::{MetricsTracker, PoolMetrics};

use crossbeam::queue::ArrayQueue;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

type CreateFn<T> = dyn Fn() -> Result<T, BoxError> + Send + Sync;
type DestroyFn<T> = dyn Fn(T) -> Result<(), BoxError> + Send + Sync;

/// A pooled resource that goes back to the pool when dropped
///
/// Use [`release`](PooledResource::release) to observe errors from the return path,
/// or [`close`](PooledResource::close) to destroy a resource known to be broken.
pub struct PooledResource<T> {
    resource: Option<T>,
    pool: Arc<PoolInner<T>>,
}

impl<T> PooledResource<T> {
    fn new(resource: T, pool: Arc<PoolInner<T>>) -> Self {
        Self {
            resource: Some(resource),
            pool,
        }
    }

    /// Return the resource to the idle area
    pub fn release(mut self) -> PoolResult<()> {
        match self.resource.take() {
            Some(resource) => self.pool.release(resource),
            None => Ok(()),
        }
    }

    /// Destroy the resource instead of returning it
    pub fn close(mut self) -> PoolResult<()> {
        match self.resource.take() {
            Some(resource) => self.pool.close_one(resource),
            None => Ok(()),
        }
    }
}

impl<T> Deref for PooledResource<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().expect("resource already returned")
    }
}

impl<T> DerefMut for PooledResource<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().expect("resource already returned")
    }
}

impl<T> Drop for PooledResource<T> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            if let Err(err) = self.pool.release(resource) {
                warn!(error = %err, "failed to return dropped resource to the pool");
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PooledResource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledResource")
            .field("resource", &self.resource)
            .finish()
    }
}

/// Counters guarded by the pool lock.
///
/// `live` counts idle plus outstanding resources, including slots reserved
/// for a `create` call that has not finished yet.
struct Bookkeeping {
    live: usize,
    closed: bool,
}

struct PoolInner<T> {
    idle: ArrayQueue<IdleEntry<T>>,
    state: Mutex<Bookkeeping>,
    capacity_freed: Condvar,
    config: PoolConfiguration,
    create: Box<CreateFn<T>>,
    destroy: Box<DestroyFn<T>>,
    metrics: MetricsTracker,
}

impl<T> PoolInner<T> {
    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn live(&self) -> usize {
        self.state.lock().live
    }

    /// Reserve one unit of capacity for a resource about to be created
    fn reserve(&self) -> PoolResult<bool> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PoolError::PoolClosed);
        }
        if state.live >= self.config.max_capacity {
            return Ok(false);
        }
        state.live += 1;
        Ok(true)
    }

    /// Drop one resource from the live count and wake waiters
    fn forget_one(&self) {
        {
            let mut state = self.state.lock();
            state.live = state.live.saturating_sub(1);
        }
        self.capacity_freed.notify_all();
    }

    fn create_resource(&self) -> Result<T, BoxError> {
        match (self.create)() {
            Ok(resource) => {
                MetricsTracker::incr(&self.metrics.total_created);
                debug!("created pooled resource");
                Ok(resource)
            }
            Err(err) => {
                MetricsTracker::incr(&self.metrics.creation_failures);
                debug!(error = %err, "resource creation failed");
                Err(err)
            }
        }
    }

    fn destroy_resource(&self, resource: T) -> Result<(), SharedError> {
        MetricsTracker::incr(&self.metrics.total_destroyed);
        (self.destroy)(resource).map_err(|err| {
            MetricsTracker::incr(&self.metrics.destroy_failures);
            SharedError::from(err)
        })
    }

    /// Destroy a resource nobody is waiting on; failures are only logged
    fn discard(&self, resource: T, reason: &'static str) {
        let result = self.destroy_resource(resource);
        self.forget_one();
        if let Err(err) = result {
            warn!(error = %err, reason, "failed to destroy pooled resource");
        }
    }

    /// Queue an entry unless the pool is closed or the idle area is full.
    ///
    /// The push happens under the lock so a drain that has flipped `closed`
    /// is guaranteed to see every entry pushed before it.
    fn put_idle(&self, entry: IdleEntry<T>) -> Result<(), IdleEntry<T>> {
        let pushed = {
            let state = self.state.lock();
            if state.closed {
                Err(entry)
            } else {
                self.idle.push(entry)
            }
        };
        if pushed.is_ok() {
            self.capacity_freed.notify_all();
        }
        pushed
    }

    fn release(&self, resource: T) -> PoolResult<()> {
        match self.put_idle(IdleEntry::new(resource)) {
            Ok(()) => {
                MetricsTracker::incr(&self.metrics.total_released);
                Ok(())
            }
            Err(entry) => {
                MetricsTracker::incr(&self.metrics.surplus_destroyed);
                debug!("destroying returned resource: pool closed or idle area full");
                let result = self.destroy_resource(entry.resource);
                self.forget_one();
                result.map_err(PoolError::ResourceDestructionFailed)
            }
        }
    }

    fn close_one(&self, resource: T) -> PoolResult<()> {
        let result = self.destroy_resource(resource);
        self.forget_one();
        result.map_err(PoolError::ResourceDestructionFailed)
    }

    /// One pass of the acquire algorithm; `Ok(None)` means the pool is at capacity
    fn try_take(&self) -> PoolResult<Option<T>> {
        loop {
            if let Some(entry) = self.idle.pop() {
                if self.is_closed() {
                    self.discard(entry.resource, "pool closed");
                    return Err(PoolError::PoolClosed);
                }
                if entry.is_stale(self.config.idle_timeout) {
                    MetricsTracker::incr(&self.metrics.stale_evictions);
                    debug!(idle_for = ?entry.inserted_at.elapsed(), "evicting stale idle resource");
                    self.discard(entry.resource, "idle timeout");
                    continue;
                }
                MetricsTracker::incr(&self.metrics.total_acquired);
                return Ok(Some(entry.resource));
            }

            if !self.reserve()? {
                return Ok(None);
            }

            return match self.create_resource() {
                Ok(resource) if self.is_closed() => {
                    self.discard(resource, "pool closed");
                    Err(PoolError::PoolClosed)
                }
                Ok(resource) => {
                    MetricsTracker::incr(&self.metrics.total_acquired);
                    Ok(Some(resource))
                }
                Err(err) => {
                    self.forget_one();
                    Err(PoolError::creation(err))
                }
            };
        }
    }

    fn acquire_blocking(&self, timeout: Option<Duration>) -> PoolResult<T> {
        // A deadline past what `Instant` can represent means no deadline.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        loop {
            if let Some(resource) = self.try_take()? {
                return Ok(resource);
            }

            let mut wait = self.config.backoff_interval;
            if let (Some(deadline), Some(timeout)) = (deadline, timeout) {
                let now = Instant::now();
                if now >= deadline {
                    return Err(PoolError::Timeout(timeout));
                }
                wait = wait.min(deadline - now);
            }

            MetricsTracker::incr(&self.metrics.exhausted_waits);
            trace!(?wait, "pool at capacity, waiting for a resource");

            let mut state = self.state.lock();
            if !state.closed && self.idle.is_empty() && state.live >= self.config.max_capacity {
                self.capacity_freed.wait_for(&mut state, wait);
            }
        }
    }

    /// Close the pool and destroy every idle resource
    fn drain(&self) -> Vec<SharedError> {
        let was_closed = std::mem::replace(&mut self.state.lock().closed, true);
        self.capacity_freed.notify_all();

        let mut failures = Vec::new();
        let mut drained = 0usize;
        while let Some(entry) = self.idle.pop() {
            drained += 1;
            let result = self.destroy_resource(entry.resource);
            self.forget_one();
            if let Err(err) = result {
                warn!(error = %err, "failed to destroy idle resource while draining");
                failures.push(err);
            }
        }

        if !was_closed || drained > 0 {
            info!(drained, failed = failures.len(), "resource pool drained");
        }
        failures
    }
}

impl<T> Drop for PoolInner<T> {
    fn drop(&mut self) {
        // Every handle and lent-out resource is gone; idle ones still need their destroy call.
        self.drain();
    }
}

/// Thread-safe pool of expensive, reusable resources
///
/// Resources are produced by a `create` callback, lent out by [`acquire`](ResourcePool::acquire)
/// and handed to a `destroy` callback when they expire, overflow the idle area,
/// are closed explicitly, or the pool is drained. Cloning a pool yields another
/// handle to the same resources.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{PoolConfiguration, ResourcePool};
///
/// let pool = ResourcePool::new(
///     PoolConfiguration::new().with_min_capacity(3).with_max_capacity(5),
///     || Ok(vec![0u8; 16]),
///     |_| Ok(()),
/// )
/// .unwrap();
/// assert_eq!(pool.idle_count(), 3);
///
/// {
///     let buffer = pool.acquire().unwrap();
///     assert_eq!(buffer.len(), 16);
///     assert_eq!(pool.idle_count(), 2);
/// }
///
/// assert_eq!(pool.idle_count(), 3);
/// pool.drain_all().unwrap();
/// assert!(pool.acquire().is_err());
/// ```
pub struct ResourcePool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for ResourcePool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> ResourcePool<T> {
    /// Create a pool and pre-fill it with `min_capacity` resources
    pub fn new<C, D>(config: PoolConfiguration, create: C, destroy: D) -> PoolResult<Self>
    where
        C: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
        D: Fn(T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        config.validate()?;

        let inner = Arc::new(PoolInner {
            idle: ArrayQueue::new(config.max_capacity),
            state: Mutex::new(Bookkeeping {
                live: 0,
                closed: false,
            }),
            capacity_freed: Condvar::new(),
            config,
            create: Box::new(create),
            destroy: Box::new(destroy),
            metrics: MetricsTracker::new(),
        });

        for _ in 0..inner.config.min_capacity {
            let resource = match inner.create_resource() {
                Ok(resource) => resource,
                Err(err) => {
                    let cleanup_failures = inner.drain();
                    warn!(
                        error = %err,
                        cleanup_failures = cleanup_failures.len(),
                        "failed to pre-fill resource pool"
                    );
                    return Err(PoolError::initialization(err));
                }
            };
            inner.state.lock().live += 1;
            if let Err(entry) = inner.put_idle(IdleEntry::new(resource)) {
                inner.discard(entry.resource, "idle area full");
            }
        }

        info!(
            min_capacity = inner.config.min_capacity,
            max_capacity = inner.config.max_capacity,
            idle_timeout = ?inner.config.idle_timeout,
            "resource pool created"
        );

        Ok(Self { inner })
    }

    /// Acquire a resource, waiting while the pool is at capacity
    ///
    /// Waits up to the configured `acquire_timeout`, or indefinitely when none is set.
    pub fn acquire(&self) -> PoolResult<PooledResource<T>> {
        self.inner
            .acquire_blocking(self.inner.config.acquire_timeout)
            .map(|resource| self.wrap(resource))
    }

    /// Acquire a resource, giving up with [`PoolError::Timeout`] after `timeout`
    pub fn acquire_timeout(&self, timeout: Duration) -> PoolResult<PooledResource<T>> {
        self.inner
            .acquire_blocking(Some(timeout))
            .map(|resource| self.wrap(resource))
    }

    /// Acquire a resource without waiting
    pub fn try_acquire(&self) -> PoolResult<PooledResource<T>> {
        match self.inner.try_take()? {
            Some(resource) => Ok(self.wrap(resource)),
            None => Err(PoolError::PoolExhausted),
        }
    }

    /// Acquire a resource asynchronously
    ///
    /// Polls every `backoff_interval` while the pool is at capacity and honors
    /// `acquire_timeout`. Dropping the future abandons the wait.
    ///
    /// The `create` and `destroy` callbacks run inline on the calling task, so
    /// a slow constructor blocks the executor thread while it runs.
    pub async fn acquire_async(&self) -> PoolResult<PooledResource<T>> {
        let attempt = async {
            loop {
                match self.inner.try_take() {
                    Ok(Some(resource)) => return Ok(self.wrap(resource)),
                    Ok(None) => {}
                    Err(err) => return Err(err),
                }
                MetricsTracker::incr(&self.inner.metrics.exhausted_waits);
                tokio::time::sleep(self.inner.config.backoff_interval).await;
            }
        };

        match self.inner.config.acquire_timeout {
            Some(timeout) => tokio::time::timeout(timeout, attempt)
                .await
                .map_err(|_| PoolError::Timeout(timeout))?,
            None => attempt.await,
        }
    }

    /// Return a resource to the pool
    ///
    /// Fails with [`PoolError::InvalidArgument`] if the resource was acquired
    /// from a different pool; that resource then goes back to its own pool.
    pub fn release(&self, resource: PooledResource<T>) -> PoolResult<()> {
        self.check_owner(&resource)?;
        resource.release()
    }

    /// Destroy a single resource instead of returning it
    pub fn close_one(&self, resource: PooledResource<T>) -> PoolResult<()> {
        self.check_owner(&resource)?;
        resource.close()
    }

    /// Close the pool and destroy every idle resource
    ///
    /// Resources currently lent out are destroyed when they are released or
    /// closed. Calling this more than once is harmless.
    pub fn drain_all(&self) -> PoolResult<()> {
        let failures = self.inner.drain();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(PoolError::DrainFailed(failures))
        }
    }

    /// Pre-create up to `count` idle resources, bounded by the remaining capacity
    ///
    /// Returns how many resources were added.
    pub fn warmup(&self, count: usize) -> PoolResult<usize> {
        let mut added = 0;
        for _ in 0..count {
            if !self.inner.reserve()? {
                break;
            }
            let resource = self.inner.create_resource().map_err(|err| {
                self.inner.forget_one();
                PoolError::creation(err)
            })?;
            if let Err(entry) = self.inner.put_idle(IdleEntry::new(resource)) {
                self.inner.discard(entry.resource, "warmup rejected");
                break;
            }
            added += 1;
        }
        debug!(added, "warmed up resource pool");
        Ok(added)
    }

    /// Destroy every idle resource that has exceeded the idle timeout
    ///
    /// Expiry normally happens lazily during acquire; this sweeps the idle area
    /// on demand. Fresh entries keep their timestamp and relative order. Returns the
    /// number of evicted resources.
    pub fn evict_stale(&self) -> usize {
        let Some(timeout) = self.inner.config.idle_timeout else {
            return 0;
        };

        let now = Instant::now();
        let mut fresh = Vec::new();
        let mut evicted = 0;
        for _ in 0..self.inner.idle.len() {
            let Some(entry) = self.inner.idle.pop() else {
                break;
            };
            if entry.is_stale_at(Some(timeout), now) {
                MetricsTracker::incr(&self.inner.metrics.stale_evictions);
                self.inner.discard(entry.resource, "idle timeout");
                evicted += 1;
            } else {
                fresh.push(entry);
            }
        }

        for entry in fresh {
            if let Err(entry) = self.inner.put_idle(entry) {
                self.inner.discard(entry.resource, "idle area unavailable");
            }
        }

        if evicted > 0 {
            debug!(evicted, "evicted stale idle resources");
        }
        evicted
    }

    /// Number of resources waiting in the idle area
    pub fn idle_count(&self) -> usize {
        self.inner.idle.len()
    }

    /// Number of resources in existence, idle or lent out
    pub fn live_count(&self) -> usize {
        self.inner.live()
    }

    /// Number of resources currently lent out
    pub fn outstanding_count(&self) -> usize {
        self.inner.live().saturating_sub(self.inner.idle.len())
    }

    /// Maximum number of resources the pool allows at once
    pub fn max_capacity(&self) -> usize {
        self.inner.config.max_capacity
    }

    /// Whether [`drain_all`](ResourcePool::drain_all) has been called
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// The configuration this pool was built with
    pub fn config(&self) -> &PoolConfiguration {
        &self.inner.config
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        self.inner.metrics.get_metrics(
            self.inner.live(),
            self.inner.idle.len(),
            self.inner.config.max_capacity,
        )
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> prometheus::Result<String> {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        HealthStatus::from_metrics(&self.get_metrics(), self.is_closed())
    }

    fn wrap(&self, resource: T) -> PooledResource<T> {
        PooledResource::new(resource, Arc::clone(&self.inner))
    }

    fn check_owner(&self, resource: &PooledResource<T>) -> PoolResult<()> {
        if Arc::ptr_eq(&self.inner, &resource.pool) {
            Ok(())
        } else {
            Err(PoolError::InvalidArgument(
                "resource was acquired from a different pool".to_string(),
            ))
        }
    }
}

impl<T> fmt::Debug for ResourcePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ResourcePool")
            .field("live", &state.live)
            .field("idle", &self.inner.idle.len())
            .field("closed", &state.closed)
            .field("config", &self.inner.config)
            .finish()
    }
}
