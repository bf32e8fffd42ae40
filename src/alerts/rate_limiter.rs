//! Hourly alert-creation caps per (type, severity)
//!
//! Every increment schedules its own decrement one hour later, so the
//! counter is the number of alerts created in the trailing hour as seen
//! at decay time, not a fixed-window bucket.

use super::scheduler::{ScheduledTask, Scheduler};
use super::types::{AlertSeverity, AlertType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// How long each increment counts against the cap
pub const DECAY_AFTER: Duration = Duration::from_secs(60 * 60);

/// Per-severity hourly caps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub info: u32,
}

impl RateLimits {
    /// Cap for a severity
    pub fn cap(&self, severity: AlertSeverity) -> u32 {
        match severity {
            AlertSeverity::Critical => self.critical,
            AlertSeverity::High => self.high,
            AlertSeverity::Medium => self.medium,
            AlertSeverity::Low => self.low,
            AlertSeverity::Info => self.info,
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            critical: 10,
            high: 8,
            medium: 5,
            low: 3,
            info: 2,
        }
    }
}

/// Decay-per-increment rate limiter
#[derive(Debug, Default)]
pub struct RateLimiter {
    limits: RateLimits,
    counts: HashMap<(AlertType, AlertSeverity), u32>,
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            counts: HashMap::new(),
        }
    }

    /// Whether the cap for this pair is reached
    pub fn is_limited(&self, alert_type: AlertType, severity: AlertSeverity) -> bool {
        self.count(alert_type, severity) >= self.limits.cap(severity)
    }

    /// Count one alert and schedule its decay
    pub fn increment(
        &mut self,
        alert_type: AlertType,
        severity: AlertSeverity,
        now: SystemTime,
        scheduler: &mut Scheduler<ScheduledTask>,
    ) {
        *self.counts.entry((alert_type, severity)).or_insert(0) += 1;
        scheduler.schedule(
            now + DECAY_AFTER,
            ScheduledTask::RateDecay {
                alert_type,
                severity,
            },
        );
    }

    /// Undo one increment
    pub fn decay(&mut self, alert_type: AlertType, severity: AlertSeverity) {
        if let Some(count) = self.counts.get_mut(&(alert_type, severity)) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.counts.remove(&(alert_type, severity));
            }
        }
    }

    /// Current count for a pair
    pub fn count(&self, alert_type: AlertType, severity: AlertSeverity) -> u32 {
        self.counts
            .get(&(alert_type, severity))
            .copied()
            .unwrap_or(0)
    }

    pub fn limits(&self) -> &RateLimits {
        &self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn apply_decays(
        limiter: &mut RateLimiter,
        scheduler: &mut Scheduler<ScheduledTask>,
        now: SystemTime,
    ) {
        for task in scheduler.drain_due(now) {
            if let ScheduledTask::RateDecay {
                alert_type,
                severity,
            } = task
            {
                limiter.decay(alert_type, severity);
            }
        }
    }

    #[test]
    fn test_default_caps() {
        let limits = RateLimits::default();
        assert_eq!(limits.cap(AlertSeverity::Critical), 10);
        assert_eq!(limits.cap(AlertSeverity::High), 8);
        assert_eq!(limits.cap(AlertSeverity::Medium), 5);
        assert_eq!(limits.cap(AlertSeverity::Low), 3);
        assert_eq!(limits.cap(AlertSeverity::Info), 2);
    }

    #[test]
    fn test_limit_reached_at_cap() {
        let mut limiter = RateLimiter::default();
        let mut scheduler = Scheduler::new();

        assert!(!limiter.is_limited(AlertType::Error, AlertSeverity::Info));
        limiter.increment(AlertType::Error, AlertSeverity::Info, at(0), &mut scheduler);
        limiter.increment(AlertType::Error, AlertSeverity::Info, at(1), &mut scheduler);
        assert!(limiter.is_limited(AlertType::Error, AlertSeverity::Info));

        // Other pairs are independent
        assert!(!limiter.is_limited(AlertType::Performance, AlertSeverity::Info));
        assert!(!limiter.is_limited(AlertType::Error, AlertSeverity::Low));
    }

    #[test]
    fn test_each_increment_decays_separately() {
        let mut limiter = RateLimiter::default();
        let mut scheduler = Scheduler::new();

        limiter.increment(AlertType::Error, AlertSeverity::Info, at(0), &mut scheduler);
        limiter.increment(AlertType::Error, AlertSeverity::Info, at(1_800), &mut scheduler);

        apply_decays(&mut limiter, &mut scheduler, at(3_599));
        assert_eq!(limiter.count(AlertType::Error, AlertSeverity::Info), 2);

        // First increment expires alone; the second still counts
        apply_decays(&mut limiter, &mut scheduler, at(3_600));
        assert_eq!(limiter.count(AlertType::Error, AlertSeverity::Info), 1);
        assert!(!limiter.is_limited(AlertType::Error, AlertSeverity::Info));

        apply_decays(&mut limiter, &mut scheduler, at(5_400));
        assert_eq!(limiter.count(AlertType::Error, AlertSeverity::Info), 0);
    }

    #[test]
    fn test_decay_never_underflows() {
        let mut limiter = RateLimiter::default();
        limiter.decay(AlertType::Security, AlertSeverity::Critical);
        assert_eq!(limiter.count(AlertType::Security, AlertSeverity::Critical), 0);
    }
}
