//! # EsoxSolutions.ResourcePool
//!
//! Thread-safe pool for expensive, reusable resources such as network
//! connections, with bounded capacity, lazy growth, idle-time eviction and
//! graceful drain.
//!
//! ## Features
//!
//! - Resources built and torn down by user-supplied `create`/`destroy` callbacks
//! - Pre-filling with `min_capacity` resources, lazy growth up to `max_capacity`
//! - Lock-free FIFO idle area; bookkeeping lock never held across callbacks
//! - Idle timeout checked lazily on acquire, plus an on-demand sweep
//! - Blocking, deadline-bounded, non-blocking and async acquisition
//! - Automatic return of resources via RAII (Drop trait)
//! - Graceful drain: idle resources destroyed now, lent ones on return
//! - Health status, metrics and Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_resourcepool::{PoolConfiguration, ResourcePool};
//!
//! let pool = ResourcePool::new(
//!     PoolConfiguration::new().with_min_capacity(1).with_max_capacity(4),
//!     || Ok(String::from("connection")),
//!     |_conn| Ok(()),
//! )
//! .unwrap();
//!
//! {
//!     let conn = pool.acquire().unwrap();
//!     println!("Got: {}", *conn);
//!     // Resource automatically returned when `conn` goes out of scope
//! }
//!
//! pool.drain_all().unwrap();
//! ```

mod pool;
mod config;
mod metrics;
mod health;
mod eviction;
mod errors;

pub use pool::{ResourcePool, PooledResource};
pub use config::{PoolConfiguration, DEFAULT_BACKOFF_INTERVAL};
pub use metrics::PoolMetrics;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use health::HealthStatus;
pub use errors::{BoxError, PoolError, PoolResult, SharedError};
