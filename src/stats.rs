//! Occupancy snapshots and lifetime counters for pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time view of a pool's occupancy, taken under the pool lock.
///
/// # Examples
///
/// ```
/// use lendpool::PoolStatus;
///
/// let status = PoolStatus { idle: 1, in_use: 3, total: 4, max_size: 8 };
/// assert_eq!(status.utilization(), 0.375);
/// assert!(!status.is_at_capacity());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolStatus {
    /// Idle instances ready for reuse.
    pub idle: usize,
    /// Instances currently checked out.
    pub in_use: usize,
    /// `idle + in_use`.
    pub total: usize,
    /// Upper bound on `total`.
    pub max_size: usize,
}

impl PoolStatus {
    /// Fraction of capacity currently checked out, `0.0` to `1.0`.
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            self.in_use as f64 / self.max_size as f64
        }
    }

    /// Whether every permitted instance is already alive.
    pub fn is_at_capacity(&self) -> bool {
        self.total >= self.max_size
    }
}

/// Lifetime counters for one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolStats {
    /// Instances constructed by the factory.
    pub created: usize,
    /// Instances handed to the disposal hook.
    pub disposed: usize,
    /// Successful checkouts, fresh and reused.
    pub checkouts: usize,
    /// Instances returned to the idle list.
    pub returns: usize,
    /// Positive-duration waits that expired empty-handed; zero-wait
    /// expiries are not counted.
    pub timeouts: usize,
    /// Acquires that failed through a cancel token.
    pub cancellations: usize,
}

/// Renders pool state in the Prometheus exposition format.
pub struct StatsExporter;

impl StatsExporter {
    /// Export counters and occupancy as Prometheus text.
    ///
    /// # Examples
    ///
    /// ```
    /// use lendpool::{PoolStats, PoolStatus, StatsExporter};
    ///
    /// let status = PoolStatus { idle: 2, in_use: 1, total: 3, max_size: 4 };
    /// let output = StatsExporter::export_prometheus(&PoolStats::default(), &status, "db", None);
    /// assert!(output.contains("lendpool_instances_in_use{pool=\"db\"} 1"));
    /// ```
    pub fn export_prometheus(
        stats: &PoolStats,
        status: &PoolStatus,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        // Gauge metrics
        output.push_str("# HELP lendpool_instances_idle Idle instances ready for reuse\n");
        output.push_str("# TYPE lendpool_instances_idle gauge\n");
        output.push_str(&format!("lendpool_instances_idle{{{}}} {}\n", labels, status.idle));

        output.push_str("# HELP lendpool_instances_in_use Instances currently checked out\n");
        output.push_str("# TYPE lendpool_instances_in_use gauge\n");
        output.push_str(&format!("lendpool_instances_in_use{{{}}} {}\n", labels, status.in_use));

        output.push_str("# HELP lendpool_utilization Checked-out fraction of capacity\n");
        output.push_str("# TYPE lendpool_utilization gauge\n");
        output.push_str(&format!("lendpool_utilization{{{}}} {:.2}\n", labels, status.utilization()));

        // Counter metrics
        output.push_str("# HELP lendpool_created_total Instances constructed by the factory\n");
        output.push_str("# TYPE lendpool_created_total counter\n");
        output.push_str(&format!("lendpool_created_total{{{}}} {}\n", labels, stats.created));

        output.push_str("# HELP lendpool_disposed_total Instances handed to the disposal hook\n");
        output.push_str("# TYPE lendpool_disposed_total counter\n");
        output.push_str(&format!("lendpool_disposed_total{{{}}} {}\n", labels, stats.disposed));

        output.push_str("# HELP lendpool_checkouts_total Successful checkouts\n");
        output.push_str("# TYPE lendpool_checkouts_total counter\n");
        output.push_str(&format!("lendpool_checkouts_total{{{}}} {}\n", labels, stats.checkouts));

        output.push_str("# HELP lendpool_returns_total Instances returned to the idle list\n");
        output.push_str("# TYPE lendpool_returns_total counter\n");
        output.push_str(&format!("lendpool_returns_total{{{}}} {}\n", labels, stats.returns));

        output.push_str("# HELP lendpool_timeouts_total Timed acquires that expired\n");
        output.push_str("# TYPE lendpool_timeouts_total counter\n");
        output.push_str(&format!("lendpool_timeouts_total{{{}}} {}\n", labels, stats.timeouts));

        output.push_str("# HELP lendpool_cancellations_total Acquires cancelled while waiting\n");
        output.push_str("# TYPE lendpool_cancellations_total counter\n");
        output.push_str(&format!("lendpool_cancellations_total{{{}}} {}\n", labels, stats.cancellations));

        output
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal counter cells updated by the engine.
#[derive(Debug, Default)]
pub(crate) struct StatsTracker {
    pub created: AtomicUsize,
    pub disposed: AtomicUsize,
    pub checkouts: AtomicUsize,
    pub returns: AtomicUsize,
    pub timeouts: AtomicUsize,
    pub cancellations: AtomicUsize,
}

impl StatsTracker {
    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            disposed: self.disposed.load(Ordering::Relaxed),
            checkouts: self.checkouts.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
        }
    }
}
