//! Selection policies for choosing which idle instance to reuse

/// Strategy consulted by a pool to decide which idle instance an acquire
/// should hand out.
///
/// The pool calls [`pick`](PickPolicy::pick) with its lock held, so an
/// implementation may inspect the idle slice freely without further
/// synchronization. `recommended` is the index of the most recently released
/// instance (`None` when the list is empty) and `could_create` reports
/// whether the pool is still under its size bound. Returning `None` tells
/// the pool to construct a new instance if it can, or to wait otherwise.
///
/// Any `Fn(&[T], Option<usize>, bool) -> Option<usize>` closure is also a
/// policy.
///
/// # Examples
///
/// ```
/// use lendpool::{Fifo, Lifo, PickPolicy};
///
/// let idle = [10, 20, 30];
/// assert_eq!(Lifo.pick(&idle, Some(2), true), Some(2));
/// assert_eq!(Fifo.pick(&idle, Some(2), true), Some(0));
/// ```
pub trait PickPolicy<T>: Send + Sync {
    /// Choose an index into `idle`, or `None` to create or wait.
    ///
    /// Returning an index past the end of `idle` is a contract violation
    /// and makes the pool panic.
    fn pick(&self, idle: &[T], recommended: Option<usize>, could_create: bool) -> Option<usize>;
}

impl<T, F> PickPolicy<T> for F
where
    F: Fn(&[T], Option<usize>, bool) -> Option<usize> + Send + Sync,
{
    fn pick(&self, idle: &[T], recommended: Option<usize>, could_create: bool) -> Option<usize> {
        self(idle, recommended, could_create)
    }
}

/// Hand out the most recently released instance first. The default policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lifo;

impl<T> PickPolicy<T> for Lifo {
    fn pick(&self, _idle: &[T], recommended: Option<usize>, _could_create: bool) -> Option<usize> {
        recommended
    }
}

/// Hand out the longest-idle instance first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

impl<T> PickPolicy<T> for Fifo {
    fn pick(&self, idle: &[T], _recommended: Option<usize>, _could_create: bool) -> Option<usize> {
        if idle.is_empty() { None } else { Some(0) }
    }
}
