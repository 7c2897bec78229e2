//! Idle-time eviction for pooled resources

use std::time::{Duration, Instant};

/// A resource waiting in the idle area, stamped with the moment it went idle
#[derive(Debug)]
pub(crate) struct IdleEntry<T> {
    pub resource: T,
    pub inserted_at: Instant,
}

impl<T> IdleEntry<T> {
    pub fn new(resource: T) -> Self {
        Self {
            resource,
            inserted_at: Instant::now(),
        }
    }

    /// An entry is stale once it has been idle for at least `idle_timeout`
    pub fn is_stale(&self, idle_timeout: Option<Duration>) -> bool {
        self.is_stale_at(idle_timeout, Instant::now())
    }

    pub fn is_stale_at(&self, idle_timeout: Option<Duration>, now: Instant) -> bool {
        match idle_timeout {
            Some(timeout) => now.saturating_duration_since(self.inserted_at) >= timeout,
            None => false,
        }
    }
}
