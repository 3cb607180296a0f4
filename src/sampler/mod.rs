//! Reservoir sampler: per-key admission control, window-based sampling
//! flags, and a flush cycle that formats accumulated state back into
//! StatsD lines.

mod bucket;
pub mod runtime;

use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::SamplerConfig;
use crate::error::{ConsiderOutcome, SamplerError};
use crate::random::{RandomSource, SeededRandomSource};
use crate::validate::{MetricType, ParsedRecord};

use bucket::{Bucket, BucketCommon, TimerState, LOWER_UNSET, UPPER_UNSET};

pub use runtime::SamplerRuntime;

/// Matches the source's `MAX_UDP_LENGTH`: a single flushed line, including
/// the key, is never synthesized longer than this.
const MAX_LINE_LENGTH: usize = 1472;

/// Per-key reservoir sampler and admission controller.
///
/// Not internally synchronized — a single `Sampler` is meant to be driven by
/// one thread at a time. [`SamplerRuntime`] bridges it to a background
/// [`crate::timer::TimerScheduler`] for hosts that want a self-contained
/// flush/expiry loop instead of calling `flush`/`expire` themselves.
pub struct Sampler {
    threshold: i64,
    window_secs: i64,
    cardinality: u64,
    reservoir_size: i64,
    timer_flush_min_max: bool,
    hm_expiry_frequency_secs: u64,
    hm_ttl_secs: i64,
    buckets: HashMap<String, Bucket>,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
}

impl Sampler {
    /// Builds a sampler from a validated configuration. Fails the same way
    /// [`SamplerConfig::validate`] does; a caller that already validated the
    /// config elsewhere can skip straight to [`Sampler::new_unchecked`].
    pub fn new(
        config: SamplerConfig,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, SamplerError> {
        config.validate()?;
        Ok(Self::new_unchecked(config, clock, random))
    }

    /// Builds a sampler without re-validating `config`.
    pub fn new_unchecked(
        config: SamplerConfig,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            threshold: config.threshold,
            window_secs: config.window_secs,
            cardinality: config.cardinality,
            reservoir_size: config.reservoir_size,
            timer_flush_min_max: config.timer_flush_min_max,
            hm_expiry_frequency_secs: config.hm_expiry_frequency_secs,
            hm_ttl_secs: config.hm_ttl_secs,
            buckets: HashMap::new(),
            clock,
            random,
        }
    }

    /// Builds a sampler using the system clock and a time-seeded PRNG.
    pub fn with_system_clock(config: SamplerConfig) -> Result<Self, SamplerError> {
        Self::new(
            config,
            Arc::new(SystemClock),
            Arc::new(SeededRandomSource::from_time()),
        )
    }

    pub fn window_secs(&self) -> i64 {
        self.window_secs
    }

    pub fn hm_expiry_frequency_secs(&self) -> u64 {
        self.hm_expiry_frequency_secs
    }

    pub fn hm_ttl_secs(&self) -> i64 {
        self.hm_ttl_secs
    }

    /// Number of distinct keys currently tracked.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn at_cardinality_cap(&self) -> bool {
        self.buckets.len() as u64 >= self.cardinality
    }

    /// Whether `name` is currently in sampling mode for `metric_type`.
    pub fn is_sampling(&self, name: &str, metric_type: MetricType) -> bool {
        match self.buckets.get(name) {
            Some(bucket) => bucket.common().sampling && bucket.metric_type() == metric_type,
            None => false,
        }
    }

    /// Applies a counter observation. `record.metric_type` must be
    /// [`MetricType::Counter`], else this is a no-op returning
    /// [`ConsiderOutcome::NotSampling`].
    pub fn consider_counter(&mut self, name: &str, record: &ParsedRecord<'_>) -> ConsiderOutcome {
        if record.metric_type != MetricType::Counter {
            return ConsiderOutcome::NotSampling;
        }

        let now = self.clock.now_coarse();

        if !self.buckets.contains_key(name) {
            if self.at_cardinality_cap() {
                tracing::error!(key = name, "flagging counter: cardinality cap reached");
                return ConsiderOutcome::Flagged;
            }
            self.buckets
                .insert(name.to_string(), Bucket::new_counter(1, now));
            return ConsiderOutcome::NotSampling;
        }

        let bucket = self.buckets.get_mut(name).expect("checked contains_key above");
        let common = bucket.common_mut();
        common.last_window_count += 1;
        common.last_modified_at = now;

        if !common.sampling && common.last_window_count as i64 > self.threshold {
            tracing::debug!(key = name, "started counter sampling");
            common.sampling = true;
        }

        if common.sampling {
            let weight = presampling_weight(record.presampling_value);
            common.sum += record.value * weight;
            common.count += weight;
            return ConsiderOutcome::Sampling;
        }

        ConsiderOutcome::NotSampling
    }

    /// Applies a gauge observation. Unlike counters and timers, a freshly
    /// created gauge bucket runs the window/sampling check on the very same
    /// call that creates it.
    pub fn consider_gauge(&mut self, name: &str, record: &ParsedRecord<'_>) -> ConsiderOutcome {
        if record.metric_type != MetricType::Gauge {
            return ConsiderOutcome::NotSampling;
        }

        let now = self.clock.now_coarse();

        if !self.buckets.contains_key(name) {
            if self.at_cardinality_cap() {
                tracing::error!(key = name, "flagging gauge: cardinality cap reached");
                return ConsiderOutcome::Flagged;
            }
            self.buckets
                .insert(name.to_string(), Bucket::new_gauge(0, now));
        }

        let bucket = self.buckets.get_mut(name).expect("inserted or already present");
        let common = bucket.common_mut();
        common.last_modified_at = now;

        if self.threshold <= 0 {
            return ConsiderOutcome::NotSampling;
        }

        common.last_window_count += 1;

        if !common.sampling && common.last_window_count as i64 > self.threshold {
            tracing::debug!(key = name, "started gauge sampling");
            common.sampling = true;
        }

        if common.sampling {
            common.sum += record.value;
            common.count += 1.0;
            return ConsiderOutcome::Sampling;
        }

        ConsiderOutcome::NotSampling
    }

    /// Applies a timer observation, updating the running extrema and
    /// reservoir once sampling is active for this key.
    pub fn consider_timer(&mut self, name: &str, record: &ParsedRecord<'_>) -> ConsiderOutcome {
        if record.metric_type != MetricType::Timer {
            return ConsiderOutcome::NotSampling;
        }

        let now = self.clock.now_coarse();

        if !self.buckets.contains_key(name) {
            if self.at_cardinality_cap() {
                tracing::error!(key = name, "flagging timer: cardinality cap reached");
                return ConsiderOutcome::Flagged;
            }
            let mut bucket = Bucket::new_timer(self.reservoir_size.max(0) as usize, now);
            bucket.common_mut().last_window_count = 1;
            self.buckets.insert(name.to_string(), bucket);
            return ConsiderOutcome::NotSampling;
        }

        let bucket = self.buckets.get_mut(name).expect("checked contains_key above");
        {
            let common = bucket.common_mut();
            common.last_window_count += 1;
            common.last_modified_at = now;

            if !common.sampling && common.last_window_count as i64 > self.threshold {
                tracing::debug!(key = name, "started timer sampling");
                common.sampling = true;
            }

            if !common.sampling {
                return ConsiderOutcome::NotSampling;
            }
        }

        let (common, state) = match bucket {
            Bucket::Timer(c, t) => (c, t),
            _ => unreachable!("a key admitted through consider_timer always holds a Timer bucket"),
        };

        accumulate_timer(
            common,
            state,
            record.value,
            record.presampling_value,
            self.threshold,
            self.random.as_ref(),
        );
        ConsiderOutcome::Sampling
    }

    /// Runs the window-rollover check over every tracked key without
    /// flushing: flips `sampling` on/off per key based on the window just
    /// closed, then resets the per-window counter. `flush` already does
    /// this as part of its own cycle; call this directly only if flushing
    /// and window bookkeeping need to happen on different schedules.
    pub fn update_flags(&mut self) {
        let threshold = self.threshold;
        for (key, bucket) in self.buckets.iter_mut() {
            update_bucket_window(key, bucket, threshold);
        }
    }

    /// Formats and emits one line per accumulated sample via `emit(key,
    /// line)`, then rolls the window over for every key (sampled or not).
    pub fn flush(&mut self, mut emit: impl FnMut(&str, &str)) {
        let threshold = self.threshold;
        let timer_flush_min_max = self.timer_flush_min_max;
        let emit: &mut dyn FnMut(&str, &str) = &mut emit;
        for (key, bucket) in self.buckets.iter_mut() {
            flush_bucket(key, bucket, threshold, timer_flush_min_max, emit);
        }
    }

    /// Removes every non-sampling key whose `last_modified_at` is more than
    /// `ttl_secs` old. A negative `ttl_secs` disables the sweep (matching
    /// the source's `hm_ttl == -1`) and always returns `0`.
    pub fn expire(&mut self, ttl_secs: i64) -> usize {
        if ttl_secs < 0 {
            return 0;
        }
        let now = self.clock.now_coarse();
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            let common = bucket.common();
            common.sampling || (now - common.last_modified_at) <= ttl_secs
        });
        before - self.buckets.len()
    }
}

fn presampling_weight(presampling_value: f64) -> f64 {
    if presampling_value > 0.0 && presampling_value < 1.0 {
        1.0 / presampling_value
    } else {
        1.0
    }
}

fn accumulate_timer(
    common: &mut BucketCommon,
    state: &mut TimerState,
    incoming_value: f64,
    presampling_value: f64,
    threshold: i64,
    random: &dyn RandomSource,
) {
    let mut value = incoming_value;

    if value > state.upper {
        state.upper_sample_rate = presampling_value;
        if state.upper != UPPER_UNSET {
            let old_max = state.upper;
            state.upper = value;
            value = old_max;
        } else {
            state.upper = value;
            return;
        }
    }

    if value < state.lower {
        state.lower_sample_rate = presampling_value;
        if state.lower != LOWER_UNSET {
            let old_min = state.lower;
            state.lower = value;
            value = old_min;
        } else {
            state.lower = value;
            return;
        }
    }

    if (state.reservoir_index as i64) < threshold {
        state.reservoir[state.reservoir_index] = value;
        state.reservoir_index += 1;
    } else {
        // `last_window_count` was incremented before this function was
        // reached on every path that leads here, so it is always >= 1.
        let k = random.next_u64() % common.last_window_count;
        if (k as i64) < threshold {
            state.reservoir[k as usize] = value;
        }
    }

    let weight = presampling_weight(presampling_value);
    common.sum += value;
    common.count += weight;
}

/// Name used in `started`/`stopped sampling` log lines, matching the
/// source's `metric_type_name`.
fn bucket_type_name(bucket: &Bucket) -> &'static str {
    match bucket {
        Bucket::Counter(_) => "counter",
        Bucket::Gauge(_) => "gauge",
        Bucket::Timer(_, _) => "timer",
    }
}

fn update_bucket_window(key: &str, bucket: &mut Bucket, threshold: i64) {
    let last_window_count = bucket.common().last_window_count;
    let sampling = bucket.common().sampling;
    let should_start = last_window_count as i64 > threshold;
    let should_stop = sampling && !should_start;

    if should_stop {
        tracing::debug!(key, "stopped {} sampling", bucket_type_name(bucket));
    }

    if let Bucket::Timer(_, state) = bucket {
        if should_stop {
            state.reservoir_index = 0;
        }
    }

    let common = bucket.common_mut();
    if should_start {
        common.sampling = true;
    } else if should_stop {
        common.sampling = false;
    }
    common.last_window_count = 0;
}

fn emit_checked(emit: &mut dyn FnMut(&str, &str), key: &str, line: &str) -> bool {
    if line.len() > MAX_LINE_LENGTH {
        tracing::error!(key, len = line.len(), "flush line exceeds max UDP length, dropping");
        return false;
    }
    emit(key, line);
    true
}

fn flush_bucket(
    key: &str,
    bucket: &mut Bucket,
    threshold: i64,
    timer_flush_min_max: bool,
    emit: &mut dyn FnMut(&str, &str),
) {
    let should_flush = {
        let common = bucket.common();
        common.sampling && common.count != 0.0
    };

    if should_flush {
        let completed = match bucket {
            Bucket::Counter(common) => flush_counter(key, common, emit),
            Bucket::Gauge(common) => flush_gauge(key, common, emit),
            Bucket::Timer(common, state) => {
                flush_timer(key, common, state, threshold, timer_flush_min_max, emit)
            }
        };
        if completed {
            let common = bucket.common_mut();
            common.sum = 0.0;
            common.count = 0.0;
        }
    }

    update_bucket_window(key, bucket, threshold);
}

fn flush_counter(key: &str, common: &BucketCommon, emit: &mut dyn FnMut(&str, &str)) -> bool {
    let line = format!(
        "{key}:{}|c@{}",
        format_g(common.sum / common.count),
        format_g(1.0 / common.count)
    );
    emit_checked(emit, key, &line)
}

fn flush_gauge(key: &str, common: &BucketCommon, emit: &mut dyn FnMut(&str, &str)) -> bool {
    let line = format!("{key}:{}|g", format_g(common.sum / common.count));
    emit_checked(emit, key, &line)
}

fn flush_timer(
    key: &str,
    common: &BucketCommon,
    state: &mut TimerState,
    threshold: i64,
    timer_flush_min_max: bool,
    emit: &mut dyn FnMut(&str, &str),
) -> bool {
    if timer_flush_min_max {
        if state.upper != UPPER_UNSET {
            let line = format!(
                "{key}:{}|ms@{}",
                format_g(state.upper),
                format_g(state.upper_sample_rate)
            );
            if !emit_checked(emit, key, &line) {
                return false;
            }
            state.upper = UPPER_UNSET;
        }
        if state.lower != LOWER_UNSET {
            let line = format!(
                "{key}:{}|ms@{}",
                format_g(state.lower),
                format_g(state.lower_sample_rate)
            );
            if !emit_checked(emit, key, &line) {
                return false;
            }
            state.lower = LOWER_UNSET;
        }
    }

    let bound = (threshold.max(0) as usize).min(state.reservoir.len());
    let num_samples = state.reservoir[..bound].iter().filter(|v| !v.is_nan()).count();
    let sample_rate = num_samples as f64 / common.count;

    for slot in state.reservoir[..bound].iter_mut() {
        if !slot.is_nan() {
            let line = format!("{key}:{}|ms@{}", format_g(*slot), format_g(sample_rate));
            if !emit_checked(emit, key, &line) {
                return false;
            }
            *slot = f64::NAN;
        }
    }

    true
}

/// Formats a double the way the source's `%g` does: up to six significant
/// digits, trailing zeros and a bare decimal point trimmed, switching to
/// signed, zero-padded-exponent scientific notation outside the `%g`
/// magnitude range.
fn format_g(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    const SIG_DIGITS: i32 = 6;
    let exponent = value.abs().log10().floor() as i32;

    if exponent < -4 || exponent >= SIG_DIGITS {
        let mantissa_decimals = (SIG_DIGITS - 1).max(0) as usize;
        let formatted = format!("{value:.mantissa_decimals$e}");
        format_scientific(&formatted)
    } else {
        let decimals = (SIG_DIGITS - 1 - exponent).max(0) as usize;
        let formatted = format!("{value:.decimals$}");
        trim_trailing_zeros(&formatted)
    }
}

fn trim_trailing_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn format_scientific(s: &str) -> String {
    let (mantissa, exp) = s
        .split_once('e')
        .expect("Rust's {:e} formatter always emits an 'e'");
    let mantissa = trim_trailing_zeros(mantissa);
    let exp_value: i32 = exp.parse().expect("Rust's {:e} exponent is always an integer");
    format!(
        "{mantissa}e{}{:02}",
        if exp_value < 0 { "-" } else { "+" },
        exp_value.abs()
    )
}
