//! Per-metric sample history
//!
//! Each metric name owns a time-ordered deque of samples. Appends trim
//! everything older than the horizon from the front; the periodic cleanup
//! sweep performs full eviction.

use super::types::Aggregation;
use crate::clock::elapsed_between;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, SystemTime};

/// Samples older than this are never read by evaluation
pub const EVALUATION_HORIZON: Duration = Duration::from_secs(60 * 60);

/// A single observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSample {
    pub value: f64,
    pub timestamp: SystemTime,
}

/// Metric sample buffers keyed by metric name
#[derive(Debug)]
pub struct MetricBuffer {
    series: HashMap<String, VecDeque<MetricSample>>,
    horizon: Duration,
}

impl MetricBuffer {
    /// Create a buffer with the given read horizon
    pub fn new(horizon: Duration) -> Self {
        Self {
            series: HashMap::new(),
            horizon,
        }
    }

    /// Append a sample. Non-finite values are dropped.
    pub fn record(&mut self, name: &str, value: f64, timestamp: SystemTime) -> bool {
        if !value.is_finite() {
            log::warn!("Ignoring non-finite sample for '{}': {}", name, value);
            return false;
        }

        let samples = self.series.entry(name.to_string()).or_default();
        samples.push_back(MetricSample { value, timestamp });

        // Lazy trim relative to the newest sample
        while let Some(front) = samples.front() {
            if elapsed_between(timestamp, front.timestamp) > self.horizon {
                samples.pop_front();
            } else {
                break;
            }
        }

        true
    }

    /// Aggregate samples of `name` seen within `window` before `now`
    pub fn query(
        &self,
        name: &str,
        window: Duration,
        aggregation: Aggregation,
        now: SystemTime,
    ) -> Option<f64> {
        let samples = self.series.get(name)?;
        let window = window.min(self.horizon);
        let cutoff = now.checked_sub(window).unwrap_or(SystemTime::UNIX_EPOCH);

        aggregation.apply(
            samples
                .iter()
                .filter(|s| s.timestamp >= cutoff)
                .map(|s| s.value),
        )
    }

    /// Drop samples before `cutoff` and forget metrics left empty.
    /// Returns the number of samples removed.
    pub fn evict_older_than(&mut self, cutoff: SystemTime) -> usize {
        let mut removed = 0;
        self.series.retain(|_, samples| {
            let before = samples.len();
            samples.retain(|s| s.timestamp >= cutoff);
            removed += before - samples.len();
            !samples.is_empty()
        });
        removed
    }

    /// Number of metric names currently tracked
    pub fn metrics_tracked(&self) -> usize {
        self.series.len()
    }

    /// Number of samples held for one metric
    pub fn sample_count(&self, name: &str) -> usize {
        self.series.get(name).map_or(0, VecDeque::len)
    }

    /// Tracked metric names, sorted
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.series.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for MetricBuffer {
    fn default() -> Self {
        Self::new(EVALUATION_HORIZON)
    }
}
