//! # lendpool
//!
//! Bounded, thread-safe, blocking resource pool: hands out at most
//! `max_size` instances of an expensive-to-create resource, blocks callers
//! when the pool is exhausted, and reclaims instances when callers finish
//! with them.
//!
//! ## Features
//!
//! - Blocking acquisition with unbounded, bounded, and zero waits
//! - Automatic return of instances via RAII ([`Lease`] and the Drop trait)
//! - Lazy construction through an injected fallible factory
//! - Pluggable selection policy ([`Lifo`], [`Fifo`], or any closure)
//! - Post-acquire and disposal hooks
//! - Cooperative cancellation of blocked callers ([`CancelToken`])
//! - Async acquisition facade with the same timeout contract
//! - Close/drain semantics that dispose idle instances exactly once
//! - Occupancy and lifetime counters with Prometheus text export
//!
//! ## Quick Start
//!
//! ```rust
//! use lendpool::BlockingPool;
//!
//! let pool = BlockingPool::new("greetings", 2, || {
//!     Ok::<_, std::convert::Infallible>(String::from("hello"))
//! });
//!
//! {
//!     let greeting = pool.acquire().unwrap();
//!     println!("{}", *greeting);
//!     // Instance automatically returned when `greeting` goes out of scope
//! }
//!
//! assert_eq!(pool.idle(), 1);
//! ```

mod cancel;
mod errors;
mod lease;
mod policy;
mod pool;
mod stats;

pub use cancel::CancelToken;
pub use errors::{FactoryError, PoolError, PoolResult};
pub use lease::Lease;
pub use policy::{Fifo, Lifo, PickPolicy};
pub use pool::{BlockingPool, Pool, PoolBuilder};
pub use stats::{PoolStats, PoolStatus, StatsExporter};
