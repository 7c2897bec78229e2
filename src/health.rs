//! Health monitoring for resource pools

use crate::metrics::PoolMetrics;

/// Utilization above which the pool reports itself unhealthy
const HIGH_UTILIZATION: f64 = 0.9;

/// Health status of a resource pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{PoolConfiguration, ResourcePool};
///
/// let pool = ResourcePool::new(
///     PoolConfiguration::new().with_min_capacity(3).with_max_capacity(5),
///     || Ok(7u8),
///     |_| Ok(()),
/// )
/// .unwrap();
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.idle_resources, 3);
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Whether the pool has been drained
    pub is_closed: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Outstanding resources as a fraction of capacity (0.0 to 1.0)
    pub utilization: f64,

    /// Idle resources count
    pub idle_resources: usize,

    /// Outstanding resources count
    pub outstanding_resources: usize,

    /// Total capacity
    pub total_capacity: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Derive a health status from a metrics snapshot
    pub fn from_metrics(metrics: &PoolMetrics, is_closed: bool) -> Self {
        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if is_closed {
            warnings.push("Pool is closed".to_string());
            is_healthy = false;
        }

        if metrics.utilization > HIGH_UTILIZATION {
            warnings.push(format!("High utilization: {:.1}%", metrics.utilization * 100.0));
            is_healthy = false;
        }

        if metrics.live_resources >= metrics.max_capacity && metrics.idle_resources == 0 {
            warnings.push("Pool is at capacity with no idle resources".to_string());
        }

        if metrics.destroy_failures > 0 {
            warnings.push(format!(
                "{} destroy callback(s) failed",
                metrics.destroy_failures
            ));
        }

        Self {
            is_healthy,
            is_closed,
            warning_count: warnings.len(),
            utilization: metrics.utilization,
            idle_resources: metrics.idle_resources,
            outstanding_resources: metrics.outstanding_resources,
            total_capacity: metrics.max_capacity,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
