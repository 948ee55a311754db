//! RAII handle for a checked-out instance

use crate::pool::PoolCore;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A checked-out instance that goes back to its pool when dropped.
///
/// Dereferences to the resource. Explicit
/// [`release`](crate::BlockingPool::release) /
/// [`remove`](crate::BlockingPool::remove) consume the value and validate
/// the pool's bookkeeping; dropping an unreleased lease hands the value back
/// best-effort instead (recycled while the pool is open, disposed after
/// close). [`into_inner`](Lease::into_inner) detaches the value from the
/// pool entirely.
pub struct Lease<T> {
    value: Option<T>,
    ticket: u64,
    core: Arc<PoolCore<T>>,
}

impl<T> Lease<T> {
    pub(crate) fn new(value: T, ticket: u64, core: Arc<PoolCore<T>>) -> Self {
        Self {
            value: Some(value),
            ticket,
            core,
        }
    }

    pub(crate) fn ticket(&self) -> u64 {
        self.ticket
    }

    pub(crate) fn belongs_to(&self, core: &Arc<PoolCore<T>>) -> bool {
        Arc::ptr_eq(&self.core, core)
    }

    pub(crate) fn take_value(&mut self) -> Option<T> {
        self.value.take()
    }

    pub(crate) fn restore(&mut self, value: T) {
        self.value = Some(value);
    }

    /// Take the value out of the pool for good.
    ///
    /// The pool forgets the instance without running the disposal hook and
    /// frees its capacity slot, waking waiters since a new instance may now
    /// be created. The caller owns the value from here on.
    pub fn into_inner(mut self) -> T {
        let value = self.value.take().expect("lease no longer holds its value");
        self.core.forget_ticket(self.ticket);
        value
    }
}

impl<T> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("lease no longer holds its value")
    }
}

impl<T> DerefMut for Lease<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("lease no longer holds its value")
    }
}

impl<T> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.core.return_from_lease(self.ticket, value);
        }
    }
}

impl<T> fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("pool", &self.core.name())
            .field("ticket", &self.ticket)
            .field("held", &self.value.is_some())
            .finish()
    }
}
