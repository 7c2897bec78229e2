//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Point-in-time metrics for a pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{PoolConfiguration, ResourcePool};
///
/// let pool = ResourcePool::new(
///     PoolConfiguration::new().with_min_capacity(2).with_max_capacity(4),
///     || Ok(String::from("conn")),
///     |_| Ok(()),
/// )
/// .unwrap();
///
/// let _conn = pool.acquire().unwrap();
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_created, 2);
/// assert_eq!(metrics.total_acquired, 1);
/// assert_eq!(metrics.outstanding_resources, 1);
/// assert_eq!(metrics.idle_resources, 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolMetrics {
    /// Resources produced by the create callback
    pub total_created: usize,

    /// Resources handed to the destroy callback
    pub total_destroyed: usize,

    /// Successful acquisitions
    pub total_acquired: usize,

    /// Resources returned to the idle area
    pub total_released: usize,

    /// Idle resources destroyed because they exceeded the idle timeout
    pub stale_evictions: usize,

    /// Returned resources destroyed because the idle area was full or the pool closed
    pub surplus_destroyed: usize,

    /// Times an acquire had to wait because the pool was at capacity
    pub exhausted_waits: usize,

    /// Failed create callbacks
    pub creation_failures: usize,

    /// Failed destroy callbacks
    pub destroy_failures: usize,

    /// Resources currently in existence (idle + outstanding)
    pub live_resources: usize,

    /// Resources currently waiting in the idle area
    pub idle_resources: usize,

    /// Resources currently lent out
    pub outstanding_resources: usize,

    /// Outstanding resources as a fraction of capacity (0.0 to 1.0)
    pub utilization: f64,

    /// Maximum pool capacity
    pub max_capacity: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("stale_evictions".to_string(), self.stale_evictions.to_string());
        metrics.insert("surplus_destroyed".to_string(), self.surplus_destroyed.to_string());
        metrics.insert("exhausted_waits".to_string(), self.exhausted_waits.to_string());
        metrics.insert("creation_failures".to_string(), self.creation_failures.to_string());
        metrics.insert("destroy_failures".to_string(), self.destroy_failures.to_string());
        metrics.insert("live_resources".to_string(), self.live_resources.to_string());
        metrics.insert("idle_resources".to_string(), self.idle_resources.to_string());
        metrics.insert(
            "outstanding_resources".to_string(),
            self.outstanding_resources.to_string(),
        );
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("max_capacity".to_string(), self.max_capacity.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus text exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::{PoolConfiguration, ResourcePool};
    /// use std::collections::HashMap;
    ///
    /// let pool = ResourcePool::new(
    ///     PoolConfiguration::new().with_min_capacity(1),
    ///     || Ok(0u32),
    ///     |_| Ok(()),
    /// )
    /// .unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "rpc".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("rpc_clients", Some(&tags)).unwrap();
    /// assert!(output.contains("resourcepool_resources_idle"));
    /// assert!(output.contains("service=\"rpc\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> prometheus::Result<String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.insert(key.clone(), value.clone());
            }
        }
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(labels.clone());

        let registry = Registry::new();

        // Gauge metrics
        let gauges = [
            ("resourcepool_resources_live", "Resources currently in existence", metrics.live_resources),
            ("resourcepool_resources_idle", "Resources waiting in the idle area", metrics.idle_resources),
            (
                "resourcepool_resources_outstanding",
                "Resources currently lent out",
                metrics.outstanding_resources,
            ),
            ("resourcepool_capacity", "Maximum pool capacity", metrics.max_capacity),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(opts(name, help))?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge))?;
        }

        let utilization = Gauge::with_opts(opts("resourcepool_utilization", "Pool utilization ratio"))?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization))?;

        // Counter metrics
        let counters = [
            ("resourcepool_created_total", "Resources created", metrics.total_created),
            ("resourcepool_destroyed_total", "Resources destroyed", metrics.total_destroyed),
            ("resourcepool_acquired_total", "Successful acquisitions", metrics.total_acquired),
            ("resourcepool_released_total", "Resources returned to the idle area", metrics.total_released),
            ("resourcepool_stale_evictions_total", "Idle resources evicted for age", metrics.stale_evictions),
            ("resourcepool_surplus_destroyed_total", "Returned resources destroyed as surplus", metrics.surplus_destroyed),
            ("resourcepool_exhausted_waits_total", "Acquire waits on a full pool", metrics.exhausted_waits),
            ("resourcepool_creation_failures_total", "Failed create callbacks", metrics.creation_failures),
            ("resourcepool_destroy_failures_total", "Failed destroy callbacks", metrics.destroy_failures),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(opts(name, help))?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter))?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_created: AtomicUsize,
    pub total_destroyed: AtomicUsize,
    pub total_acquired: AtomicUsize,
    pub total_released: AtomicUsize,
    pub stale_evictions: AtomicUsize,
    pub surplus_destroyed: AtomicUsize,
    pub exhausted_waits: AtomicUsize,
    pub creation_failures: AtomicUsize,
    pub destroy_failures: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, live: usize, idle: usize, capacity: usize) -> PoolMetrics {
        let outstanding = live.saturating_sub(idle);
        let utilization = if capacity > 0 {
            outstanding as f64 / capacity as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_created: self.total_created.load(Ordering::Relaxed),
            total_destroyed: self.total_destroyed.load(Ordering::Relaxed),
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            stale_evictions: self.stale_evictions.load(Ordering::Relaxed),
            surplus_destroyed: self.surplus_destroyed.load(Ordering::Relaxed),
            exhausted_waits: self.exhausted_waits.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            destroy_failures: self.destroy_failures.load(Ordering::Relaxed),
            live_resources: live,
            idle_resources: idle,
            outstanding_resources: outstanding,
            utilization,
            max_capacity: capacity,
        }
    }
}
