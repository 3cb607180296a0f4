//! Injectable time source.
//!
//! `Sampler` and `Elider` never call `SystemTime::now()` directly; they go
//! through a `Clock` so expiry and window-rollover tests can drive time
//! deterministically without sleeping.

use std::time::{SystemTime, UNIX_EPOCH};

/// A source of wall-clock time.
///
/// `now_coarse()` mirrors the source's `CLOCK_REALTIME_COARSE` use: callers
/// that only need whole-second resolution (expiry sweeps, `last_modified_at`
/// bookkeeping) should prefer it over `now()`.
pub trait Clock: Send + Sync {
    /// Current time as seconds and microseconds since the Unix epoch.
    fn now(&self) -> (i64, i64);

    /// Current time as whole Unix seconds. The default implementation just
    /// truncates `now()`; a host with a cheaper coarse clock can override
    /// it.
    fn now_coarse(&self) -> i64 {
        self.now().0
    }
}

/// `Clock` backed by `std::time::SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> (i64, i64) {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => (d.as_secs() as i64, d.subsec_micros() as i64),
            // A clock set before the epoch is a host misconfiguration, not a
            // condition this library should panic over; report zero.
            Err(_) => (0, 0),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_now_is_after_epoch() {
        let (secs, _micros) = SystemClock.now();
        assert!(secs > 0);
    }

    #[test]
    fn system_clock_now_coarse_matches_now_seconds() {
        let clock = SystemClock;
        let (secs, _) = clock.now();
        let coarse = clock.now_coarse();
        assert!((coarse - secs).abs() <= 1);
    }

    #[test]
    fn fake_clock_advances() {
        let clock = test_support::FakeClock::new(100);
        assert_eq!(clock.now_coarse(), 100);
        clock.advance(50);
        assert_eq!(clock.now_coarse(), 150);
        clock.set(0);
        assert_eq!(clock.now_coarse(), 0);
    }
}
