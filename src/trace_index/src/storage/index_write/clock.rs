//! Time sources for dedup windows.
//!
//! Dedup windows are compared in nanoseconds from an arbitrary origin. Only
//! differences matter, so a monotonic clock is used in production and a
//! manually advanced one in tests.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// `d` in nanoseconds, saturating at `u64::MAX` (about 584 years).
pub(crate) fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// A monotonic time source.
pub trait Clock: Send + Sync + Debug {
    /// Nanoseconds elapsed since this clock's origin.
    fn now_nanos(&self) -> u64;
}

/// Clock backed by [`Instant`].
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
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
    fn now_nanos(&self) -> u64 {
        // u64 nanoseconds covers several centuries of uptime.
        saturating_nanos(self.origin.elapsed())
    }
}

/// Clock that only moves when told to.
///
/// # Example
///
/// ```rust,ignore
/// let clock = Arc::new(ManualClock::new());
/// clock.set(Duration::from_secs(10));
/// clock.advance(Duration::from_millis(500));
/// assert_eq!(clock.now_nanos(), 10_500_000_000);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to an absolute offset from the origin.
    pub fn set(&self, offset: Duration) {
        self.nanos.store(saturating_nanos(offset), Ordering::SeqCst);
    }

    /// Move forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let delta = saturating_nanos(delta);
        let _ = self
            .nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(delta))
            });
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        assert_eq!(clock.now_nanos(), 0);

        clock.set(Duration::from_secs(10));
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.now_nanos(), 10_500_000_000);
    }

    #[test]
    fn test_manual_clock_saturates() {
        let clock = ManualClock::new();
        clock.set(Duration::from_secs(u64::MAX));
        assert_eq!(clock.now_nanos(), u64::MAX);

        clock.set(Duration::from_secs(1));
        clock.advance(Duration::from_secs(18_446_744_074));
        assert_eq!(clock.now_nanos(), u64::MAX);
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now_nanos(), u64::MAX);
    }

    #[test]
    fn test_monotonic_clock_never_goes_back() {
        let clock = MonotonicClock::new();
        let first = clock.now_nanos();
        let second = clock.now_nanos();
        assert!(second >= first);
    }
}
