//! Time sources for the engine.
//!
//! The engine reads time only from an injected [`Clock`]; caller-supplied
//! timestamps are never trusted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A monotonic source of unix-second timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall-clock time, clamped so it never goes backwards.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let prev = self.last.fetch_max(wall, Ordering::SeqCst);
        prev.max(wall)
    }
}

/// A clock that only moves when told to. Used by tests and the mock chain.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Move the clock forward to `ts`. Earlier values are ignored.
    pub fn set(&self, ts: u64) -> u64 {
        self.now.fetch_max(ts, Ordering::SeqCst).max(ts)
    }

    /// Advance by `secs` and return the new time.
    pub fn advance(&self, secs: u64) -> u64 {
        let mut current = self.now.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_add(secs);
            match self
                .now
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_monotonic() {
        let clock = ManualClock::new(1000);
        assert_eq!(clock.now(), 1000);

        assert_eq!(clock.advance(600), 1600);
        assert_eq!(clock.set(5000), 5000);

        // Going backwards is ignored
        assert_eq!(clock.set(10), 5000);
        assert_eq!(clock.now(), 5000);
    }

    #[test]
    fn test_system_clock_never_decreases() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(a > 0);
    }
}
