//! Thread-driven wrapper bridging [`Elider`] to an injected [`TimerScheduler`].
//!
//! The source's `elide_init` self-schedules its GC sweep on the process-wide
//! `libev` default loop whenever `gc_ttl != -1`; `ElideRuntime` reproduces
//! that self-scheduling behavior without the global-loop coupling, mirroring
//! [`crate::sampler::runtime::SamplerRuntime`]'s bridge for `Sampler`.

use std::sync::{Arc, Mutex};

use crate::elide::Elider;
use crate::timer::{TimerHandle, TimerScheduler};

/// Runs an [`Elider`] under a periodic GC sweep supplied by a
/// [`TimerScheduler`].
pub struct ElideRuntime {
    elider: Arc<Mutex<Elider>>,
    gc_handle: Option<Box<dyn TimerHandle>>,
}

impl ElideRuntime {
    /// Wraps `elider` and schedules its GC sweep on `scheduler` every
    /// `gc_frequency_secs` seconds. No sweep is scheduled if `gc_ttl_secs` is
    /// `-1`, matching the source's `gc_ttl != -1` guard around starting the
    /// timer at all.
    pub fn new(
        elider: Elider,
        gc_frequency_secs: u64,
        gc_ttl_secs: i64,
        scheduler: &dyn TimerScheduler,
    ) -> Self {
        let shared = Arc::new(Mutex::new(elider));

        let gc_handle = if gc_ttl_secs != -1 {
            let gc_shared = shared.clone();
            Some(scheduler.schedule(
                gc_frequency_secs.max(1),
                Box::new(move || {
                    let mut elider = gc_shared.lock().unwrap_or_else(|p| p.into_inner());
                    let before = elider.len();
                    tracing::debug!(size = before, "elide gc starting");
                    let removed = elider.gc_idle(gc_ttl_secs);
                    tracing::debug!(size = elider.len(), removed, "elide gc complete");
                }),
            ))
        } else {
            None
        };

        Self {
            elider: shared,
            gc_handle,
        }
    }

    /// Records that `key` was observed with an unchanged value, locking the
    /// wrapped tracker.
    pub fn mark(&self, key: &str) -> i64 {
        self.lock().mark(key)
    }

    /// Records that `key`'s value changed, locking the wrapped tracker.
    pub fn unmark(&self, key: &str) -> i64 {
        self.lock().unmark(key)
    }

    /// Number of distinct keys currently tracked.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Elider> {
        self.elider.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ElideRuntime {
    fn drop(&mut self) {
        if let Some(handle) = self.gc_handle.take() {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ThreadTimerScheduler;
    use std::time::Duration;

    #[test]
    fn gc_sweep_fires_and_removes_idle_entries() {
        let elider = Elider::with_system_clock(0);
        let scheduler = ThreadTimerScheduler;
        let runtime = ElideRuntime::new(elider, 1, 0, &scheduler);

        assert_eq!(runtime.mark("k"), 0);
        assert_eq!(runtime.len(), 1);

        // gc_ttl_secs=0 means any entry whose last_seen is <= now is swept
        // on the next tick.
        std::thread::sleep(Duration::from_millis(1300));
        assert_eq!(runtime.len(), 0);
    }

    #[test]
    fn no_sweep_scheduled_when_ttl_disabled() {
        let elider = Elider::with_system_clock(0);
        let scheduler = ThreadTimerScheduler;
        let runtime = ElideRuntime::new(elider, 1, -1, &scheduler);
        assert!(runtime.gc_handle.is_none());
        runtime.mark("k");
        std::thread::sleep(Duration::from_millis(1300));
        assert_eq!(runtime.len(), 1);
    }
}
