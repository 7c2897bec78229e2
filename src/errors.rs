//! Error types for the resource pool

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Error type returned by the user-supplied `create` and `destroy` callbacks
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Shared form of a callback error, kept behind an `Arc` so `PoolError` stays `Clone`
pub type SharedError = Arc<dyn StdError + Send + Sync>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to pre-fill the pool: {0}")]
    PoolInitializationFailed(#[source] SharedError),

    #[error("Failed to create a resource: {0}")]
    ResourceCreationFailed(#[source] SharedError),

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to destroy a resource: {0}")]
    ResourceDestructionFailed(#[source] SharedError),

    #[error("Failed to destroy {} resource(s) while draining the pool", .0.len())]
    DrainFailed(Vec<SharedError>),

    #[error("Pool is exhausted - all resources are in use")]
    PoolExhausted,

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl PoolError {
    pub(crate) fn initialization(err: BoxError) -> Self {
        Self::PoolInitializationFailed(Arc::from(err))
    }

    pub(crate) fn creation(err: BoxError) -> Self {
        Self::ResourceCreationFailed(Arc::from(err))
    }

    /// Whether a later retry of the same operation could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ResourceCreationFailed(_) | Self::PoolExhausted | Self::Timeout(_)
        )
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
