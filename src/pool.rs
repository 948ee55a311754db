//! The pool contract and the blocking pool engine

use crate::cancel::CancelToken;
use crate::errors::{FactoryError, PoolError, PoolResult};
use crate::lease::Lease;
use crate::policy::{Lifo, PickPolicy};
use crate::stats::{PoolStats, PoolStatus, StatsExporter, StatsTracker};

use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

/// Interval between attempts in the async acquire facade.
const ASYNC_POLL_INTERVAL: Duration = Duration::from_millis(10);

type Factory<T> = Box<dyn Fn() -> Result<T, FactoryError> + Send + Sync>;
type DisposeFn<T> = Box<dyn Fn(T) + Send + Sync>;
type AcquireHook<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// The capability set every pool implementation exposes.
///
/// The fully general operation is [`acquire_timed`](Pool::acquire_timed);
/// the other acquire forms are layered on top of it as default methods and
/// differ only in how an expired deadline is reported: `acquire_timed`
/// fails with [`PoolError::Timeout`], while [`acquire_within`](Pool::acquire_within)
/// and [`try_acquire`](Pool::try_acquire) yield `Ok(None)`. Every other
/// failure is an error in every form.
pub trait Pool: Send + Sync {
    type Resource;

    /// Diagnostic label fixed at construction.
    fn name(&self) -> &str;

    /// Upper bound on instances concurrently alive under pool management.
    fn max_size(&self) -> usize;

    /// Instances currently alive, `in_use() + idle()`. Snapshot under the
    /// pool lock.
    fn total(&self) -> usize;

    /// Instances currently checked out. Snapshot under the pool lock.
    fn in_use(&self) -> usize;

    /// Instances currently idle. Snapshot under the pool lock.
    fn idle(&self) -> usize;

    /// Acquire with an optional wait bound: `None` waits forever,
    /// `Some(Duration::ZERO)` fails fast, `Some(d)` waits up to `d`.
    fn acquire_timed(&self, wait: Option<Duration>) -> PoolResult<Lease<Self::Resource>>;

    /// Return a checked-out instance to the pool. On a closed pool the
    /// instance is disposed instead of recycled and the call still succeeds.
    fn release(&self, lease: &mut Lease<Self::Resource>) -> PoolResult<()>;

    /// Defined identically to [`release`](Pool::release); the pool does not
    /// distinguish a healthy return from a discard. Disposal behavior
    /// belongs to the hooks supplied at construction.
    fn remove(&self, lease: &mut Lease<Self::Resource>) -> PoolResult<()> {
        self.release(lease)
    }

    /// Acquire, waiting as long as it takes.
    fn acquire(&self) -> PoolResult<Lease<Self::Resource>> {
        self.acquire_timed(None)
    }

    /// Acquire with an optional wait bound, yielding `Ok(None)` instead of
    /// an error when the deadline expires.
    fn acquire_within(&self, wait: Option<Duration>) -> PoolResult<Option<Lease<Self::Resource>>> {
        match self.acquire_timed(wait) {
            Ok(lease) => Ok(Some(lease)),
            Err(PoolError::Timeout { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Acquire without waiting at all.
    fn try_acquire(&self) -> PoolResult<Option<Lease<Self::Resource>>> {
        self.acquire_within(Some(Duration::ZERO))
    }
}

struct PoolState<T> {
    available: Vec<T>,
    out: HashSet<u64>,
    closed: bool,
    next_ticket: u64,
}

impl<T> PoolState<T> {
    fn total(&self) -> usize {
        self.available.len() + self.out.len()
    }
}

/// Shared interior of a [`BlockingPool`], also kept alive by every
/// outstanding [`Lease`].
pub(crate) struct PoolCore<T> {
    name: String,
    max_size: usize,
    state: Mutex<PoolState<T>>,
    signal: Arc<Condvar>,
    factory: Factory<T>,
    dispose: Option<DisposeFn<T>>,
    on_acquire: Option<AcquireHook<T>>,
    policy: Box<dyn PickPolicy<T>>,
    stats: StatsTracker,
}

impl<T> PoolCore<T> {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    fn dispose_value(&self, value: T) {
        match &self.dispose {
            Some(hook) => hook(value),
            None => drop(value),
        }
        self.stats.disposed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(pool = %self.name, "instance disposed");
    }

    /// Return path for [`Lease`] drops. Cannot be misuse: the ticket was
    /// minted by this pool and the value is consumed exactly once.
    pub(crate) fn return_from_lease(&self, ticket: u64, value: T) {
        let mut state = self.state.lock();
        if state.closed {
            self.dispose_value(value);
            return;
        }
        if state.out.remove(&ticket) {
            state.available.push(value);
            self.stats.returns.fetch_add(1, Ordering::Relaxed);
            self.signal.notify_all();
            drop(state);
            tracing::trace!(pool = %self.name, ticket, "instance returned");
        } else {
            drop(state);
            self.dispose_value(value);
        }
    }

    /// Forget a checked-out ticket without taking its instance back.
    pub(crate) fn forget_ticket(&self, ticket: u64) {
        let mut state = self.state.lock();
        if state.out.remove(&ticket) {
            self.signal.notify_all();
        }
    }
}

impl<T> Drop for PoolCore<T> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for value in state.available.drain(..) {
            match &self.dispose {
                Some(hook) => hook(value),
                None => drop(value),
            }
        }
    }
}

/// Bounded, thread-safe, blocking resource pool.
///
/// Hands out at most `max_size` instances of `T`, constructed lazily by the
/// factory supplied at build time. When the pool is exhausted, acquire
/// blocks on a condition variable until an instance is returned, capacity
/// frees up, the deadline expires, the pool closes, or the call is
/// cancelled. Cloning the pool clones a handle to the same shared state.
///
/// # Examples
///
/// ```
/// use lendpool::BlockingPool;
///
/// let pool = BlockingPool::new("buffers", 2, || {
///     Ok::<_, std::convert::Infallible>(Vec::<u8>::with_capacity(1024))
/// });
///
/// let mut buffer = pool.acquire().unwrap();
/// buffer.extend_from_slice(b"hello");
/// pool.release(&mut buffer).unwrap();
/// assert_eq!(pool.idle(), 1);
/// ```
pub struct BlockingPool<T> {
    core: Arc<PoolCore<T>>,
}

impl<T> Clone for BlockingPool<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

/// Configures and constructs a [`BlockingPool`].
///
/// # Examples
///
/// ```
/// use lendpool::{BlockingPool, Fifo};
///
/// let pool = BlockingPool::builder("buffers", 4)
///     .policy(Fifo)
///     .on_acquire(|buf: &mut Vec<u8>| buf.clear())
///     .build(|| Ok::<_, std::convert::Infallible>(Vec::with_capacity(4096)));
///
/// let buf = pool.acquire().unwrap();
/// assert!(buf.capacity() >= 4096);
/// ```
pub struct PoolBuilder<T> {
    name: String,
    max_size: usize,
    dispose: Option<DisposeFn<T>>,
    on_acquire: Option<AcquireHook<T>>,
    policy: Box<dyn PickPolicy<T>>,
}

impl<T: Send + 'static> PoolBuilder<T> {
    /// Start a builder for a pool of up to `max_size` instances.
    ///
    /// # Panics
    ///
    /// Panics if `max_size` is 0; a pool that can never hold an instance
    /// would block every unbounded acquire forever.
    pub fn new(name: impl Into<String>, max_size: usize) -> Self {
        assert!(max_size > 0, "pool max_size must be at least 1");
        Self {
            name: name.into(),
            max_size,
            dispose: None,
            on_acquire: None,
            policy: Box::new(Lifo),
        }
    }

    /// Hook run on every instance the pool destroys. Defaults to dropping
    /// the value. Runs with the pool lock held, so it must not call back
    /// into the pool.
    #[must_use]
    pub fn on_dispose(mut self, hook: impl Fn(T) + Send + Sync + 'static) -> Self {
        self.dispose = Some(Box::new(hook));
        self
    }

    /// Hook run on an instance just before acquire hands it out, for reset
    /// or validation side effects. Runs with the pool lock held, so it must
    /// not call back into the pool.
    #[must_use]
    pub fn on_acquire(mut self, hook: impl Fn(&mut T) + Send + Sync + 'static) -> Self {
        self.on_acquire = Some(Box::new(hook));
        self
    }

    /// Selection policy deciding which idle instance an acquire reuses.
    /// Defaults to [`Lifo`].
    #[must_use]
    pub fn policy(mut self, policy: impl PickPolicy<T> + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Finish the builder with the instance factory.
    pub fn build<F, E>(self, factory: F) -> BlockingPool<T>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<FactoryError>,
    {
        let factory: Factory<T> = Box::new(move || factory().map_err(Into::into));
        tracing::info!(pool = %self.name, max_size = self.max_size, "resource pool created");

        BlockingPool {
            core: Arc::new(PoolCore {
                name: self.name,
                max_size: self.max_size,
                state: Mutex::new(PoolState {
                    available: Vec::new(),
                    out: HashSet::new(),
                    closed: false,
                    next_ticket: 0,
                }),
                signal: Arc::new(Condvar::new()),
                factory,
                dispose: self.dispose,
                on_acquire: self.on_acquire,
                policy: self.policy,
                stats: StatsTracker::default(),
            }),
        }
    }
}

impl<T: Send + 'static> BlockingPool<T> {
    /// Create a pool with default hooks and policy.
    pub fn new<F, E>(name: impl Into<String>, max_size: usize, factory: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<FactoryError>,
    {
        PoolBuilder::new(name, max_size).build(factory)
    }

    /// Start a [`PoolBuilder`].
    pub fn builder(name: impl Into<String>, max_size: usize) -> PoolBuilder<T> {
        PoolBuilder::new(name, max_size)
    }

    /// Diagnostic label fixed at construction.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Upper bound on instances concurrently alive under pool management.
    pub fn max_size(&self) -> usize {
        self.core.max_size
    }

    /// Instances currently alive, `in_use() + idle()`.
    pub fn total(&self) -> usize {
        self.core.state.lock().total()
    }

    /// Instances currently checked out.
    pub fn in_use(&self) -> usize {
        self.core.state.lock().out.len()
    }

    /// Instances currently idle.
    pub fn idle(&self) -> usize {
        self.core.state.lock().available.len()
    }

    /// Occupancy snapshot taken under one lock acquisition.
    pub fn status(&self) -> PoolStatus {
        let state = self.core.state.lock();
        PoolStatus {
            idle: state.available.len(),
            in_use: state.out.len(),
            total: state.total(),
            max_size: self.core.max_size,
        }
    }

    /// Lifetime counters for this pool.
    pub fn stats(&self) -> PoolStats {
        self.core.stats.snapshot()
    }

    /// Counters and occupancy in the Prometheus exposition format.
    pub fn export_prometheus(&self, tags: Option<&HashMap<String, String>>) -> String {
        StatsExporter::export_prometheus(&self.stats(), &self.status(), self.name(), tags)
    }

    /// Acquire, waiting as long as it takes.
    pub fn acquire(&self) -> PoolResult<Lease<T>> {
        self.acquire_timed(None)
    }

    /// Acquire with an optional wait bound: `None` waits forever,
    /// `Some(Duration::ZERO)` fails fast, `Some(d)` waits up to `d` against
    /// an absolute deadline captured at entry. Expiry is reported as
    /// [`PoolError::Timeout`].
    pub fn acquire_timed(&self, wait: Option<Duration>) -> PoolResult<Lease<T>> {
        self.acquire_inner(wait, None)
    }

    /// Like [`acquire_timed`](BlockingPool::acquire_timed), yielding
    /// `Ok(None)` instead of an error when the deadline expires.
    pub fn acquire_within(&self, wait: Option<Duration>) -> PoolResult<Option<Lease<T>>> {
        match self.acquire_timed(wait) {
            Ok(lease) => Ok(Some(lease)),
            Err(PoolError::Timeout { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Acquire without waiting at all.
    pub fn try_acquire(&self) -> PoolResult<Option<Lease<T>>> {
        self.acquire_within(Some(Duration::ZERO))
    }

    /// Acquire while watching a [`CancelToken`]. The call fails with
    /// [`PoolError::Cancelled`] once the token trips, even if an instance
    /// is ready, so shutdown paths never leak a lease.
    ///
    /// # Panics
    ///
    /// Panics if `token` was minted by a different pool; such a token could
    /// trip without ever waking this pool's waiters.
    pub fn acquire_cancellable(
        &self,
        wait: Option<Duration>,
        token: &CancelToken,
    ) -> PoolResult<Lease<T>> {
        assert!(
            token.watches(&self.core.signal),
            "cancel token does not belong to pool `{}`",
            self.core.name
        );
        self.acquire_inner(wait, Some(token))
    }

    /// Create a token that cancels this pool's blocked acquires.
    ///
    /// The token holds only a weak handle to the pool, so an outstanding
    /// token does not keep the pool's resources alive.
    pub fn cancel_token(&self) -> CancelToken {
        let core = Arc::downgrade(&self.core);
        CancelToken::new(
            Arc::clone(&self.core.signal),
            Arc::new(move || {
                if let Some(core) = core.upgrade() {
                    let state = core.state.lock();
                    core.signal.notify_all();
                    drop(state);
                }
            }),
        )
    }

    /// Return a checked-out instance to the pool.
    ///
    /// The lease must come from this pool and still hold its value; a
    /// double release or a foreign lease fails with
    /// [`PoolError::NotCheckedOut`] and leaves the bookkeeping untouched.
    /// On a closed pool the instance is disposed instead of recycled and
    /// the call still succeeds.
    pub fn release(&self, lease: &mut Lease<T>) -> PoolResult<()> {
        if !lease.belongs_to(&self.core) {
            return Err(PoolError::NotCheckedOut {
                pool: self.core.name.clone(),
            });
        }
        let value = match lease.take_value() {
            Some(value) => value,
            None => {
                return Err(PoolError::NotCheckedOut {
                    pool: self.core.name.clone(),
                });
            }
        };

        let mut state = self.core.state.lock();
        if state.closed {
            self.core.dispose_value(value);
            return Ok(());
        }
        if !state.out.remove(&lease.ticket()) {
            lease.restore(value);
            return Err(PoolError::NotCheckedOut {
                pool: self.core.name.clone(),
            });
        }
        state.available.push(value);
        self.core.stats.returns.fetch_add(1, Ordering::Relaxed);
        self.core.signal.notify_all();
        drop(state);

        tracing::trace!(pool = %self.core.name, ticket = lease.ticket(), "instance returned");
        Ok(())
    }

    /// Defined identically to [`release`](BlockingPool::release); the pool
    /// does not distinguish a healthy return from a discard.
    pub fn remove(&self, lease: &mut Lease<T>) -> PoolResult<()> {
        self.release(lease)
    }

    /// Close the pool: dispose every idle instance, forget the checked-out
    /// ones (their leases dispose them on release or drop), and wake all
    /// waiters so they fail out promptly. Idempotent.
    pub fn close(&self) {
        let mut state = self.core.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let drained: Vec<T> = std::mem::take(&mut state.available);
        let disposed = drained.len();
        for value in drained {
            self.core.dispose_value(value);
        }
        state.out.clear();
        self.core.signal.notify_all();
        drop(state);

        tracing::info!(pool = %self.core.name, disposed, "pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.core.state.lock().closed
    }

    /// Acquire without blocking the executor: polls the non-blocking path
    /// with a short sleep between attempts. Dropping the future is the
    /// async cancellation path.
    pub async fn acquire_async(&self) -> PoolResult<Lease<T>> {
        self.acquire_timed_async(None).await
    }

    /// Async counterpart of [`acquire_timed`](BlockingPool::acquire_timed).
    pub async fn acquire_timed_async(&self, wait: Option<Duration>) -> PoolResult<Lease<T>> {
        match wait {
            None => self.poll_acquire().await,
            Some(wait) => tokio::time::timeout(wait, self.poll_acquire())
                .await
                .map_err(|_| {
                    if wait > Duration::ZERO {
                        self.core.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                    }
                    PoolError::Timeout {
                        pool: self.core.name.clone(),
                        waited: wait,
                    }
                })?,
        }
    }

    /// Async counterpart of [`acquire_within`](BlockingPool::acquire_within).
    pub async fn acquire_within_async(
        &self,
        wait: Option<Duration>,
    ) -> PoolResult<Option<Lease<T>>> {
        match self.acquire_timed_async(wait).await {
            Ok(lease) => Ok(Some(lease)),
            Err(PoolError::Timeout { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn poll_acquire(&self) -> PoolResult<Lease<T>> {
        loop {
            match self.try_acquire()? {
                Some(lease) => return Ok(lease),
                None => tokio::time::sleep(ASYNC_POLL_INTERVAL).await,
            }
        }
    }

    fn acquire_inner(
        &self,
        wait: Option<Duration>,
        cancel: Option<&CancelToken>,
    ) -> PoolResult<Lease<T>> {
        let core = &self.core;
        // A wait too large to represent as a deadline behaves as unbounded.
        let deadline = wait.and_then(|requested| {
            Instant::now()
                .checked_add(requested)
                .map(|until| (requested, until))
        });
        let mut state = core.state.lock();

        while !state.closed {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    core.stats.cancellations.fetch_add(1, Ordering::Relaxed);
                    return Err(PoolError::Cancelled);
                }
            }

            let could_create = state.total() < core.max_size;
            let recommended = state.available.len().checked_sub(1);

            let mut value = match core.policy.pick(&state.available, recommended, could_create) {
                Some(index) => {
                    assert!(
                        index < state.available.len(),
                        "selection policy for pool `{}` returned out-of-range index {}",
                        core.name,
                        index
                    );
                    state.available.remove(index)
                }
                None if could_create => match (core.factory)() {
                    Ok(value) => {
                        core.stats.created.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(pool = %core.name, "instance created");
                        value
                    }
                    Err(source) => return Err(PoolError::CreateFailed(source)),
                },
                None => {
                    match deadline {
                        None => core.signal.wait(&mut state),
                        Some((requested, until)) => {
                            if Instant::now() >= until {
                                if requested > Duration::ZERO {
                                    core.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                                }
                                return Err(PoolError::Timeout {
                                    pool: core.name.clone(),
                                    waited: requested,
                                });
                            }
                            let _ = core.signal.wait_until(&mut state, until);
                        }
                    }
                    continue;
                }
            };

            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.out.insert(ticket);

            if let Some(hook) = &core.on_acquire {
                hook(&mut value);
            }
            core.stats.checkouts.fetch_add(1, Ordering::Relaxed);
            drop(state);

            tracing::trace!(pool = %core.name, ticket, "instance checked out");
            return Ok(Lease::new(value, ticket, Arc::clone(core)));
        }

        Err(PoolError::Closed {
            pool: core.name.clone(),
        })
    }
}

impl<T: Send + 'static> Pool for BlockingPool<T> {
    type Resource = T;

    fn name(&self) -> &str {
        self.name()
    }

    fn max_size(&self) -> usize {
        self.max_size()
    }

    fn total(&self) -> usize {
        self.total()
    }

    fn in_use(&self) -> usize {
        self.in_use()
    }

    fn idle(&self) -> usize {
        self.idle()
    }

    fn acquire_timed(&self, wait: Option<Duration>) -> PoolResult<Lease<T>> {
        self.acquire_timed(wait)
    }

    fn release(&self, lease: &mut Lease<T>) -> PoolResult<()> {
        self.release(lease)
    }
}

impl<T> fmt::Display for BlockingPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.state.lock();
        write!(
            f,
            "pool `{}`: max_size {} idle {} in_use {}",
            self.core.name,
            self.core.max_size,
            state.available.len(),
            state.out.len()
        )
    }
}

impl<T> fmt::Debug for BlockingPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.state.lock();
        f.debug_struct("BlockingPool")
            .field("name", &self.core.name)
            .field("max_size", &self.core.max_size)
            .field("idle", &state.available.len())
            .field("in_use", &state.out.len())
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Fifo;
    use std::convert::Infallible;
    use std::sync::atomic::AtomicUsize;

    fn counting_pool(name: &str, max_size: usize) -> (BlockingPool<usize>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let pool = BlockingPool::new(name, max_size, move || {
            Ok::<_, Infallible>(counter.fetch_add(1, Ordering::SeqCst))
        });
        (pool, created)
    }

    #[test]
    fn test_acquire_creates_lazily_and_reuses() {
        let (pool, created) = counting_pool("lazy", 2);
        assert_eq!(created.load(Ordering::SeqCst), 0);

        let mut first = pool.acquire().unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.in_use(), 1);
        assert_eq!(pool.idle(), 0);

        pool.release(&mut first).unwrap();
        assert_eq!(pool.idle(), 1);

        let second = pool.acquire().unwrap();
        assert_eq!(*second, 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_try_acquire_fast_fail_when_exhausted() {
        let (pool, _) = counting_pool("full", 1);
        let _held = pool.acquire().unwrap();

        let started = Instant::now();
        assert!(pool.try_acquire().unwrap().is_none());
        assert!(pool.acquire_within(Some(Duration::ZERO)).unwrap().is_none());
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_timed_acquire_dual_shapes() {
        let (pool, _) = counting_pool("timed", 1);
        let _held = pool.acquire().unwrap();

        let err = pool
            .acquire_timed(Some(Duration::from_millis(40)))
            .unwrap_err();
        assert!(matches!(err, PoolError::Timeout { .. }));

        let outcome = pool.acquire_within(Some(Duration::from_millis(40))).unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn test_huge_timeout_acquires_like_unbounded() {
        let (pool, _) = counting_pool("huge", 1);

        let mut lease = pool.acquire_timed(Some(Duration::MAX)).unwrap();
        assert_eq!(*lease, 0);
        pool.release(&mut lease).unwrap();

        let reused = pool.acquire_within(Some(Duration::MAX)).unwrap();
        assert!(reused.is_some());
    }

    #[test]
    fn test_double_release_rejected() {
        let (pool, _) = counting_pool("twice", 1);
        let mut lease = pool.acquire().unwrap();

        pool.release(&mut lease).unwrap();
        let err = pool.release(&mut lease).unwrap_err();
        assert!(matches!(err, PoolError::NotCheckedOut { .. }));
        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_release_to_wrong_pool_rejected() {
        let (pool_a, _) = counting_pool("a", 1);
        let (pool_b, _) = counting_pool("b", 1);

        let mut lease = pool_a.acquire().unwrap();
        let err = pool_b.release(&mut lease).unwrap_err();
        assert!(matches!(err, PoolError::NotCheckedOut { .. }));

        // The caller still owns the instance and can return it properly.
        assert_eq!(*lease, 0);
        pool_a.release(&mut lease).unwrap();
        assert_eq!(pool_a.idle(), 1);
        assert_eq!(pool_b.total(), 0);
    }

    #[test]
    fn test_close_disposes_idle_exactly_once() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let hook_count = Arc::clone(&disposed);
        let pool = BlockingPool::builder("drain", 3)
            .on_dispose(move |_value: usize| {
                hook_count.fetch_add(1, Ordering::SeqCst);
            })
            .build(|| Ok::<_, Infallible>(0usize));

        let mut leases: Vec<_> = (0..3).map(|_| pool.acquire().unwrap()).collect();
        for lease in &mut leases {
            pool.release(lease).unwrap();
        }
        assert_eq!(pool.idle(), 3);

        pool.close();
        assert_eq!(disposed.load(Ordering::SeqCst), 3);
        assert_eq!(pool.status().idle, 0);
        assert!(pool.is_closed());

        pool.close();
        assert_eq!(disposed.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_release_after_close_disposes_without_error() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let hook_count = Arc::clone(&disposed);
        let pool = BlockingPool::builder("late", 1)
            .on_dispose(move |_value: usize| {
                hook_count.fetch_add(1, Ordering::SeqCst);
            })
            .build(|| Ok::<_, Infallible>(9usize));

        let mut lease = pool.acquire().unwrap();
        pool.close();
        assert_eq!(disposed.load(Ordering::SeqCst), 0);

        pool.release(&mut lease).unwrap();
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.status().idle, 0);
        assert_eq!(pool.status().in_use, 0);
    }

    #[test]
    fn test_acquire_after_close_fails() {
        let (pool, _) = counting_pool("shut", 1);
        pool.close();

        assert!(matches!(
            pool.acquire().unwrap_err(),
            PoolError::Closed { .. }
        ));
        assert!(matches!(
            pool.acquire_timed(Some(Duration::from_millis(5))).unwrap_err(),
            PoolError::Closed { .. }
        ));
        // Closed is an error even in the Option-yielding forms.
        assert!(matches!(
            pool.try_acquire().unwrap_err(),
            PoolError::Closed { .. }
        ));
    }

    #[test]
    fn test_factory_failure_propagates() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let tries = Arc::clone(&attempts);
        let pool = BlockingPool::new("flaky", 2, move || {
            if tries.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(std::io::Error::other("backend refused"))
            } else {
                Ok(7u32)
            }
        });

        let err = pool.acquire().unwrap_err();
        assert!(matches!(err, PoolError::CreateFailed(_)));
        assert_eq!(pool.total(), 0);

        let lease = pool.acquire().unwrap();
        assert_eq!(*lease, 7);
    }

    #[test]
    fn test_fifo_policy_hands_out_oldest() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let pool = BlockingPool::builder("fifo", 2)
            .policy(Fifo)
            .build(move || Ok::<_, Infallible>(counter.fetch_add(1, Ordering::SeqCst)));

        let mut first = pool.acquire().unwrap();
        let mut second = pool.acquire().unwrap();
        pool.release(&mut first).unwrap();
        pool.release(&mut second).unwrap();

        // Idle order is [0, 1]; FIFO takes the front.
        assert_eq!(*pool.acquire().unwrap(), 0);
    }

    #[test]
    fn test_default_policy_hands_out_most_recent() {
        let (pool, _) = counting_pool("lifo", 2);

        let mut first = pool.acquire().unwrap();
        let mut second = pool.acquire().unwrap();
        pool.release(&mut first).unwrap();
        pool.release(&mut second).unwrap();

        assert_eq!(*pool.acquire().unwrap(), 1);
    }

    #[test]
    fn test_policy_refusal_forces_wait() {
        let pool = BlockingPool::builder("picky", 1)
            .policy(|_: &[usize], _: Option<usize>, _: bool| -> Option<usize> { None })
            .build(|| Ok::<_, Infallible>(0usize));

        let mut lease = pool.acquire().unwrap();
        pool.release(&mut lease).unwrap();
        assert_eq!(pool.idle(), 1);

        // The policy refuses the idle instance and capacity is gone, so a
        // zero wait comes back empty even though something is idle.
        assert!(pool.try_acquire().unwrap().is_none());
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_on_acquire_hook_runs() {
        let pool = BlockingPool::builder("reset", 1)
            .on_acquire(|buf: &mut Vec<i32>| buf.clear())
            .build(|| Ok::<_, Infallible>(Vec::new()));

        let mut lease = pool.acquire().unwrap();
        lease.push(42);
        pool.release(&mut lease).unwrap();

        let lease = pool.acquire().unwrap();
        assert!(lease.is_empty());
    }

    #[test]
    fn test_lease_drop_auto_returns() {
        let (pool, _) = counting_pool("raii", 1);
        {
            let _lease = pool.acquire().unwrap();
            assert_eq!(pool.in_use(), 1);
        }
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_into_inner_frees_slot() {
        let (pool, created) = counting_pool("detach", 1);

        let lease = pool.acquire().unwrap();
        let raw = lease.into_inner();
        assert_eq!(raw, 0);
        assert_eq!(pool.total(), 0);
        assert_eq!(pool.stats().disposed, 0);

        // The slot is free again, so a fresh instance can be built.
        let next = pool.try_acquire().unwrap().expect("slot freed");
        assert_eq!(*next, 1);
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cancelled_token_wins_over_available() {
        let (pool, _) = counting_pool("cancel", 1);
        let mut lease = pool.acquire().unwrap();
        pool.release(&mut lease).unwrap();
        assert_eq!(pool.idle(), 1);

        let token = pool.cancel_token();
        token.cancel();
        let err = pool.acquire_cancellable(None, &token).unwrap_err();
        assert!(matches!(err, PoolError::Cancelled));
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    #[should_panic(expected = "does not belong")]
    fn test_foreign_token_rejected() {
        let (pool_a, _) = counting_pool("token-a", 1);
        let (pool_b, _) = counting_pool("token-b", 1);

        let token = pool_a.cancel_token();
        let _ = pool_b.acquire_cancellable(Some(Duration::ZERO), &token);
    }

    #[test]
    fn test_display_echoes_counters() {
        let (pool, _) = counting_pool("printer", 2);
        let _held = pool.acquire().unwrap();

        let rendered = format!("{pool}");
        assert_eq!(rendered, "pool `printer`: max_size 2 idle 0 in_use 1");
        assert!(format!("{pool:?}").contains("closed: false"));
    }

    #[test]
    fn test_stats_track_lifecycle() {
        let (pool, _) = counting_pool("ledger", 1);

        let mut first = pool.acquire().unwrap();
        assert!(
            pool.acquire_timed(Some(Duration::from_millis(20)))
                .is_err()
        );
        pool.release(&mut first).unwrap();
        let mut second = pool.acquire().unwrap();

        pool.close();
        pool.release(&mut second).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.checkouts, 2);
        assert_eq!(stats.returns, 1);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.disposed, 1);
        assert_eq!(stats.cancellations, 0);
    }

    #[test]
    fn test_prometheus_export_mentions_pool() {
        let (pool, _) = counting_pool("scrape", 1);
        let output = pool.export_prometheus(None);
        assert!(output.contains("pool=\"scrape\""));
        assert!(output.contains("lendpool_instances_idle"));
    }

    #[test]
    #[should_panic(expected = "max_size")]
    fn test_zero_max_size_rejected() {
        let _ = BlockingPool::<u8>::builder("zero", 0);
    }

    #[test]
    fn test_contract_trait_object() {
        let pool = BlockingPool::new("contract", 1, || Ok::<_, Infallible>(1u8));
        let dyn_pool: &dyn Pool<Resource = u8> = &pool;

        let mut lease = dyn_pool.acquire().unwrap();
        assert_eq!(dyn_pool.in_use(), 1);
        assert_eq!(dyn_pool.max_size(), 1);
        assert_eq!(dyn_pool.name(), "contract");

        dyn_pool.remove(&mut lease).unwrap();
        assert_eq!(dyn_pool.idle(), 1);
    }

    #[tokio::test]
    async fn test_async_acquire_times_out() {
        let (pool, _) = counting_pool("async-t", 1);
        let _held = pool.acquire().unwrap();

        let err = pool
            .acquire_timed_async(Some(Duration::from_millis(30)))
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Timeout { .. }));

        let outcome = pool
            .acquire_within_async(Some(Duration::from_millis(30)))
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_async_acquire_succeeds_after_release() {
        let (pool, _) = counting_pool("async-s", 1);
        let held = pool.acquire().unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire_timed_async(Some(Duration::from_secs(2))).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(held);

        let lease = waiter.await.unwrap().unwrap();
        assert_eq!(*lease, 0);
    }

    #[tokio::test]
    async fn test_timeouts_count_only_positive_waits() {
        let (pool, _) = counting_pool("zero-wait", 1);
        let _held = pool.acquire().unwrap();

        assert!(pool.try_acquire().unwrap().is_none());
        let err = pool
            .acquire_timed_async(Some(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Timeout { .. }));
        assert_eq!(pool.stats().timeouts, 0);

        let err = pool
            .acquire_timed(Some(Duration::from_millis(15)))
            .unwrap_err();
        assert!(matches!(err, PoolError::Timeout { .. }));
        let err = pool
            .acquire_timed_async(Some(Duration::from_millis(15)))
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Timeout { .. }));
        assert_eq!(pool.stats().timeouts, 2);
    }
}
