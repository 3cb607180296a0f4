//! Per-key sampling state.

use crate::validate::MetricType;

/// Sentinel for "no upper value observed yet". Deliberately
/// `f64::MIN_POSITIVE` (the smallest positive normal double), not
/// `f64::MIN`/negative infinity — a genuine observed value can legitimately
/// be very negative, but it can never equal this exact sentinel, so `>` /
/// `!=` comparisons against it stay unambiguous.
pub(crate) const UPPER_UNSET: f64 = f64::MIN_POSITIVE;

/// Sentinel for "no lower value observed yet", mirroring [`UPPER_UNSET`].
pub(crate) const LOWER_UNSET: f64 = f64::MAX;

/// Fields shared by every bucket variant.
#[derive(Debug, Clone)]
pub(crate) struct BucketCommon {
    pub sampling: bool,
    pub last_window_count: u64,
    pub last_modified_at: i64,
    pub sum: f64,
    pub count: f64,
}

impl BucketCommon {
    fn new(last_window_count: u64, now: i64) -> Self {
        Self {
            sampling: false,
            last_window_count,
            last_modified_at: now,
            sum: 0.0,
            count: 0.0,
        }
    }
}

/// Timer-only state: the trailing reservoir and the running extrema.
#[derive(Debug, Clone)]
pub(crate) struct TimerState {
    pub reservoir: Vec<f64>,
    pub reservoir_index: usize,
    pub upper: f64,
    pub lower: f64,
    pub upper_sample_rate: f64,
    pub lower_sample_rate: f64,
}

impl TimerState {
    fn new(reservoir_size: usize) -> Self {
        Self {
            reservoir: vec![f64::NAN; reservoir_size],
            reservoir_index: 0,
            upper: UPPER_UNSET,
            lower: LOWER_UNSET,
            upper_sample_rate: 1.0,
            lower_sample_rate: 1.0,
        }
    }
}

/// A single key's accumulated sampling state.
///
/// Only the `Timer` variant carries a reservoir; `Counter` and `Gauge` track
/// nothing beyond [`BucketCommon`], matching the source's flexible-array
/// bucket allocation (non-timer buckets never grow the trailing array).
pub(crate) enum Bucket {
    Counter(BucketCommon),
    Gauge(BucketCommon),
    Timer(BucketCommon, TimerState),
}

impl Bucket {
    pub fn new_counter(last_window_count: u64, now: i64) -> Self {
        Bucket::Counter(BucketCommon::new(last_window_count, now))
    }

    pub fn new_gauge(last_window_count: u64, now: i64) -> Self {
        Bucket::Gauge(BucketCommon::new(last_window_count, now))
    }

    pub fn new_timer(reservoir_size: usize, now: i64) -> Self {
        Bucket::Timer(BucketCommon::new(0, now), TimerState::new(reservoir_size))
    }

    pub fn common(&self) -> &BucketCommon {
        match self {
            Bucket::Counter(c) | Bucket::Gauge(c) => c,
            Bucket::Timer(c, _) => c,
        }
    }

    pub fn common_mut(&mut self) -> &mut BucketCommon {
        match self {
            Bucket::Counter(c) | Bucket::Gauge(c) => c,
            Bucket::Timer(c, _) => c,
        }
    }

    pub fn metric_type(&self) -> MetricType {
        match self {
            Bucket::Counter(_) => MetricType::Counter,
            Bucket::Gauge(_) => MetricType::Gauge,
            Bucket::Timer(_, _) => MetricType::Timer,
        }
    }
}
