//! Typed errors and routine outcomes.
//!
//! Parse failures and configuration mistakes are genuine errors and get
//! `thiserror` variants. Cardinality exhaustion and allocation pressure are
//! not errors — they are expected, routine outcomes a caller branches on —
//! so they live in [`ConsiderOutcome`] instead, mirroring the source's
//! `sampling_result` enum.

use thiserror::Error;

/// Failure to parse a StatsD line in [`crate::validate::validate`].
///
/// The source leaves the diagnostic message optional; this carries the
/// offending line so a caller can log or count it without the validator
/// needing its own logging policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid statsd line: {line:?}")]
pub struct ValidateError {
    pub line: String,
}

impl ValidateError {
    pub(crate) fn new(line: &str) -> Self {
        Self {
            line: line.to_string(),
        }
    }
}

/// Configuration mistakes detected at [`crate::sampler::Sampler::new`] /
/// [`crate::elide::Elider::new`] time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SamplerError {
    #[error("threshold must be >= 0, got {0}")]
    InvalidThreshold(i64),
    #[error("reservoir_size ({reservoir_size}) must be >= threshold ({threshold})")]
    ReservoirTooSmall {
        reservoir_size: i64,
        threshold: i64,
    },
}

/// Outcome of a `consider_*` call on [`crate::sampler::Sampler`].
///
/// This is not a `Result`: all three variants are routine, expected outcomes
/// the caller is meant to branch on (forward unsampled, drop, or count a
/// failure metric), matching the source's `sampling_result` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsiderOutcome {
    /// The bucket is in sampling mode and this event was accumulated.
    Sampling,
    /// The bucket exists but is not currently sampling (below threshold).
    NotSampling,
    /// The key could not be admitted: the cardinality cap was reached.
    Flagged,
}

impl ConsiderOutcome {
    pub fn is_sampling(self) -> bool {
        matches!(self, ConsiderOutcome::Sampling)
    }

    pub fn is_flagged(self) -> bool {
        matches!(self, ConsiderOutcome::Flagged)
    }
}
