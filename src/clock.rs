//! Time source abstraction
//!
//! The engine never reads the wall clock directly. Production code uses
//! [`SystemClock`]; tests and the `replay` command drive a [`ManualClock`].

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Trait for reading the current time
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> SystemTime;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually advanced clock
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Create a clock frozen at the given unix time (seconds)
    pub fn at_unix(secs: u64) -> Self {
        Self::new(UNIX_EPOCH + Duration::from_secs(secs))
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    /// Jump to an absolute instant; going backwards is ignored
    pub fn set(&self, to: SystemTime) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        if to > *now {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Saturating `a - b`, zero when `b` is later than `a`
pub fn elapsed_between(later: SystemTime, earlier: SystemTime) -> Duration {
    later.duration_since(earlier).unwrap_or_default()
}

/// Milliseconds since the unix epoch, for display and ids
pub fn unix_millis(t: SystemTime) -> u128 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::at_unix(1_000);
        clock.advance(Duration::from_secs(60));
        assert_eq!(clock.now(), UNIX_EPOCH + Duration::from_secs(1_060));
    }

    #[test]
    fn test_manual_clock_never_goes_back() {
        let clock = ManualClock::at_unix(1_000);
        clock.set(UNIX_EPOCH + Duration::from_secs(10));
        assert_eq!(clock.now(), UNIX_EPOCH + Duration::from_secs(1_000));
    }

    #[test]
    fn test_elapsed_between_saturates() {
        let a = UNIX_EPOCH + Duration::from_secs(5);
        let b = UNIX_EPOCH + Duration::from_secs(10);
        assert_eq!(elapsed_between(a, b), Duration::ZERO);
        assert_eq!(elapsed_between(b, a), Duration::from_secs(5));
    }
}
