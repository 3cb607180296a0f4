//! Thread-driven wrapper bridging [`Sampler`] to an injected
//! [`TimerScheduler`].
//!
//! `Sampler` itself holds no lock and expects single-threaded, cooperative
//! access — a host built on its own event loop should drive
//! `Sampler::flush`/`Sampler::expire` directly on its own schedule instead of
//! reaching for this type. `SamplerRuntime` is for hosts with no event loop
//! of their own: it owns an `Arc<Mutex<Sampler>>` and two scheduled
//! callbacks (flush, expiry), bridging the scheduler's background thread to
//! the sampler's `&mut self` API.

use std::sync::{Arc, Mutex};

use crate::error::ConsiderOutcome;
use crate::sampler::Sampler;
use crate::timer::{TimerHandle, TimerScheduler};
use crate::validate::{MetricType, ParsedRecord};

/// Runs a [`Sampler`] under periodic flush and expiry callbacks supplied by
/// a [`TimerScheduler`].
pub struct SamplerRuntime {
    sampler: Arc<Mutex<Sampler>>,
    flush_handle: Option<Box<dyn TimerHandle>>,
    expiry_handle: Option<Box<dyn TimerHandle>>,
}

impl SamplerRuntime {
    /// Wraps `sampler` and schedules its flush/expiry cycles on `scheduler`.
    /// `emit` receives every flushed `(key, line)` pair and must tolerate
    /// being called from the scheduler's callback thread. No expiry sweep
    /// is scheduled if the sampler's `hm_ttl_secs` is `-1`.
    pub fn new(
        sampler: Sampler,
        scheduler: &dyn TimerScheduler,
        emit: impl Fn(&str, &str) + Send + Sync + 'static,
    ) -> Self {
        let window_secs = sampler.window_secs().max(1) as u64;
        let expiry_secs = sampler.hm_expiry_frequency_secs();
        let ttl_secs = sampler.hm_ttl_secs();

        let shared = Arc::new(Mutex::new(sampler));
        let emit = Arc::new(emit);

        let flush_shared = shared.clone();
        let flush_emit = emit.clone();
        let flush_handle = scheduler.schedule(
            window_secs,
            Box::new(move || {
                let mut sampler = flush_shared.lock().unwrap_or_else(|p| p.into_inner());
                sampler.flush(|key, line| flush_emit(key, line));
            }),
        );

        let expiry_handle = if ttl_secs != -1 {
            let expiry_shared = shared.clone();
            Some(scheduler.schedule(
                expiry_secs.max(1),
                Box::new(move || {
                    let mut sampler = expiry_shared.lock().unwrap_or_else(|p| p.into_inner());
                    let before = sampler.len();
                    tracing::debug!(size = before, "expiry sweep starting");
                    let removed = sampler.expire(ttl_secs);
                    tracing::debug!(size = sampler.len(), removed, "expiry sweep complete");
                }),
            ))
        } else {
            None
        };

        Self {
            sampler: shared,
            flush_handle: Some(flush_handle),
            expiry_handle,
        }
    }

    /// Applies a counter observation, locking the wrapped sampler.
    pub fn consider_counter(&self, name: &str, record: &ParsedRecord<'_>) -> ConsiderOutcome {
        self.lock().consider_counter(name, record)
    }

    /// Applies a gauge observation, locking the wrapped sampler.
    pub fn consider_gauge(&self, name: &str, record: &ParsedRecord<'_>) -> ConsiderOutcome {
        self.lock().consider_gauge(name, record)
    }

    /// Applies a timer observation, locking the wrapped sampler.
    pub fn consider_timer(&self, name: &str, record: &ParsedRecord<'_>) -> ConsiderOutcome {
        self.lock().consider_timer(name, record)
    }

    pub fn is_sampling(&self, name: &str, metric_type: MetricType) -> bool {
        self.lock().is_sampling(name, metric_type)
    }

    /// Number of distinct keys currently tracked.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sampler> {
        self.sampler.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for SamplerRuntime {
    fn drop(&mut self) {
        if let Some(handle) = self.flush_handle.take() {
            handle.cancel();
        }
        if let Some(handle) = self.expiry_handle.take() {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamplerConfig;
    use crate::timer::ThreadTimerScheduler;
    use crate::validate::validate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn flush_callback_fires_and_emits() {
        let config = SamplerConfig {
            threshold: 1,
            window_secs: 1,
            reservoir_size: 1,
            ..SamplerConfig::default()
        };
        let sampler = Sampler::with_system_clock(config).expect("valid config");
        let scheduler = ThreadTimerScheduler;
        let emitted = Arc::new(AtomicUsize::new(0));
        let emitted_clone = emitted.clone();

        let runtime = SamplerRuntime::new(sampler, &scheduler, move |_key, _line| {
            emitted_clone.fetch_add(1, Ordering::SeqCst);
        });

        let rec = validate("always.on:1|g").unwrap();
        runtime.consider_gauge("always.on", &rec);
        runtime.consider_gauge("always.on", &rec);
        assert!(runtime.is_sampling("always.on", MetricType::Gauge));

        std::thread::sleep(Duration::from_millis(1200));
        drop(runtime);
        assert!(emitted.load(Ordering::SeqCst) >= 1);
    }
}
