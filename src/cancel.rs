//! Cooperative cancellation for blocked acquire calls

use parking_lot::Condvar;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

type WakeFn = Arc<dyn Fn() + Send + Sync>;

/// Handle that cancels a blocked acquire from another thread.
///
/// Created by [`BlockingPool::cancel_token`](crate::BlockingPool::cancel_token)
/// and cheap to clone. Tripping the token wakes every waiter on its pool, so
/// a call watching it via
/// [`acquire_cancellable`](crate::BlockingPool::acquire_cancellable) fails
/// with [`PoolError::Cancelled`](crate::PoolError::Cancelled) promptly
/// instead of at its next natural wakeup. Tokens are one-shot: once
/// cancelled they stay cancelled, and a call that starts with a cancelled
/// token fails even if an instance is ready.
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    signal: Arc<Condvar>,
    wake: WakeFn,
}

impl CancelToken {
    pub(crate) fn new(signal: Arc<Condvar>, wake: WakeFn) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            signal,
            wake,
        }
    }

    /// Whether this token was minted by the pool waiting on `signal`.
    pub(crate) fn watches(&self, signal: &Arc<Condvar>) -> bool {
        Arc::ptr_eq(&self.signal, signal)
    }

    /// Trip the token and wake all waiters on the pool it came from.
    ///
    /// The wakeup runs under the pool lock, so a waiter partway between its
    /// cancellation check and its condvar wait still observes the token.
    /// Takes that lock briefly; `cancel` must not be called from inside a
    /// pool hook or selection policy.
    pub fn cancel(&self) {
        // The flag must be visible before the wakeup lands.
        self.cancelled.store(true, Ordering::SeqCst);
        (self.wake)();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Clone for CancelToken {
    fn clone(&self) -> Self {
        Self {
            cancelled: Arc::clone(&self.cancelled),
            signal: Arc::clone(&self.signal),
            wake: Arc::clone(&self.wake),
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
