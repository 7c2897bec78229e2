//! Pool configuration options

use std::time::Duration;

use crate::errors::{PoolError, PoolResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default pause between two attempts of an acquire that found the pool at capacity
pub const DEFAULT_BACKOFF_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration for resource pool behavior
///
/// # Examples
///
/// ```
/// use esox_resourcepool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_min_capacity(2)
///     .with_max_capacity(10)
///     .with_idle_timeout(Duration::from_secs(15))
///     .with_acquire_timeout(Duration::from_secs(5));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.max_capacity, 10);
/// assert_eq!(config.idle_timeout, Some(Duration::from_secs(15)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolConfiguration {
    /// Number of resources created up front when the pool is constructed
    pub min_capacity: usize,

    /// Maximum number of resources that may exist at once, idle or lent out
    pub max_capacity: usize,

    /// Idle resources older than this are destroyed instead of being handed out
    pub idle_timeout: Option<Duration>,

    /// How long an acquire waits before re-checking a pool that is at capacity
    pub backoff_interval: Duration,

    /// Deadline for `acquire`; `None` waits until a resource frees up
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            min_capacity: 0,
            max_capacity: 10,
            idle_timeout: None,
            backoff_interval: DEFAULT_BACKOFF_INTERVAL,
            acquire_timeout: None,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of resources to create at construction time
    pub fn with_min_capacity(mut self, count: usize) -> Self {
        self.min_capacity = count;
        self
    }

    /// Set the maximum number of live resources
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new().with_max_capacity(50);
    ///
    /// assert_eq!(config.max_capacity, 50);
    /// ```
    pub fn with_max_capacity(mut self, count: usize) -> Self {
        self.max_capacity = count;
        self
    }

    /// Set the idle timeout. A zero duration disables expiry.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Set the wait between retries when the pool is at capacity
    pub fn with_backoff_interval(mut self, interval: Duration) -> Self {
        self.backoff_interval = interval;
        self
    }

    /// Bound how long `acquire` may wait for capacity
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Check the capacity bounds
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::{PoolConfiguration, PoolError};
    ///
    /// let config = PoolConfiguration::new()
    ///     .with_min_capacity(5)
    ///     .with_max_capacity(3);
    ///
    /// assert!(matches!(config.validate(), Err(PoolError::InvalidConfiguration(_))));
    /// ```
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_capacity == 0 {
            return Err(PoolError::InvalidConfiguration(
                "max_capacity must be greater than 0".to_string(),
            ));
        }
        if self.min_capacity > self.max_capacity {
            return Err(PoolError::InvalidConfiguration(format!(
                "min_capacity ({}) must not exceed max_capacity ({})",
                self.min_capacity, self.max_capacity
            )));
        }
        if self.backoff_interval.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "backoff_interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
