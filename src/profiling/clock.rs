//! Monotonic clock used by every timed region.

use std::fmt;
use std::time::{Duration, Instant};

/// Monotonic wall clock
///
/// `now()` returns the time elapsed since a fixed, clock-specific origin.
/// Only differences between two readings are meaningful.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// `Instant`-backed clock (nanosecond resolution on all tier-1 platforms)
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl fmt::Debug for MonotonicClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonotonicClock").finish_non_exhaustive()
    }
}

/// Duration in fractional milliseconds
pub fn as_millis_f64(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let mut last = clock.now();
        for _ in 0..1000 {
            let now = clock.now();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_monotonic_clock_tracks_sleep() {
        let clock = MonotonicClock::new();
        let t0 = clock.now();
        std::thread::sleep(Duration::from_millis(5));
        let elapsed = clock.now() - t0;
        assert!(elapsed >= Duration::from_millis(5), "{elapsed:?}");
    }

    #[test]
    fn test_as_millis_f64() {
        assert_eq!(as_millis_f64(Duration::from_micros(1500)), 1.5);
        assert_eq!(as_millis_f64(Duration::ZERO), 0.0);
    }
}
