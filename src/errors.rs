//! Error types for the resource pool

use std::time::Duration;
use thiserror::Error;

/// Boxed failure produced by a resource factory.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum PoolError {
    /// A timed acquire found nothing available and could not create within
    /// the deadline. The convenience forms surface this as `Ok(None)` instead.
    #[error("Acquire timed out after {waited:?} on pool `{pool}`")]
    Timeout { pool: String, waited: Duration },

    #[error("Pool `{pool}` is closed")]
    Closed { pool: String },

    /// The waiting caller's cancel token was tripped.
    #[error("Acquire was cancelled")]
    Cancelled,

    /// Release or remove of an instance that is not currently checked out
    /// from this pool: a double release, a foreign lease, or a lease that
    /// already surrendered its value.
    #[error("Instance was not checked out from pool `{pool}`")]
    NotCheckedOut { pool: String },

    /// The factory failed to construct an instance. Fatal for the calling
    /// acquire; never retried internally.
    #[error("Resource factory failed")]
    CreateFailed(#[source] FactoryError),
}

pub type PoolResult<T> = Result<T, PoolError>;
