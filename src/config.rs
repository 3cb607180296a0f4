//! Plain, `serde`-deserializable configuration structs.
//!
//! Turning a YAML/TOML document on disk into these structs, and turning CLI
//! flags into overrides of them, is the host's job. The structs themselves,
//! their defaults, and validating them before handing them to
//! [`crate::sampler::Sampler::new`] / [`crate::elide::Elider::new`] are in
//! scope.

use crate::error::SamplerError;
use serde::{Deserialize, Serialize};

/// Sampler configuration. Immutable once a [`crate::sampler::Sampler`]
/// is constructed from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Per-window event count above which a key becomes "hot" and enters
    /// sampling mode; also the reservoir capacity for timers. Kept signed
    /// (mirrors the source's `int threshold` init parameter) so a negative
    /// value is a representable, rejectable configuration error rather than
    /// something the type system quietly makes impossible.
    pub threshold: i64,
    /// Advertised flush period in seconds, scheduled externally.
    pub window_secs: i64,
    /// Maximum number of distinct keys permitted; beyond this, new keys are
    /// flagged rather than admitted.
    pub cardinality: u64,
    /// Capacity hint for a timer bucket's trailing reservoir. Must be
    /// `>= threshold`.
    pub reservoir_size: i64,
    /// Whether true upper/lower timer values are emitted separately at flush.
    pub timer_flush_min_max: bool,
    /// Expiry sweep interval, in seconds.
    pub hm_expiry_frequency_secs: u64,
    /// Idle-bucket TTL, in seconds. `-1` disables expiry entirely.
    pub hm_ttl_secs: i64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            threshold: 100,
            window_secs: 10,
            cardinality: 100_000,
            reservoir_size: 100,
            timer_flush_min_max: true,
            hm_expiry_frequency_secs: 60,
            hm_ttl_secs: 600,
        }
    }
}

impl SamplerConfig {
    /// Validates the configuration. Deserializing a bad document still
    /// succeeds; only handing it to `Sampler::new` can fail.
    pub fn validate(&self) -> Result<(), SamplerError> {
        if self.threshold < 0 {
            return Err(SamplerError::InvalidThreshold(self.threshold));
        }
        if self.reservoir_size < self.threshold {
            return Err(SamplerError::ReservoirTooSmall {
                reservoir_size: self.reservoir_size,
                threshold: self.threshold,
            });
        }
        Ok(())
    }
}

/// Elider configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElideConfig {
    /// Constant added to every reported generation (jitter/offset).
    pub skip: i64,
    /// GC sweep interval, in seconds.
    pub gc_frequency_secs: u64,
    /// Entry TTL, in seconds. `-1` disables GC entirely.
    pub gc_ttl_secs: i64,
}

impl Default for ElideConfig {
    fn default() -> Self {
        Self {
            skip: 0,
            gc_frequency_secs: 60,
            gc_ttl_secs: 600,
        }
    }
}
