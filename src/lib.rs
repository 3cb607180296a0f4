//! Traffic-shaping core for a StatsD relay.
//!
//! This crate provides the parts of a metrics relay that are concurrency-free
//! but correctness-sensitive: a wire-format line [`validate`](validate::validate),
//! a per-key reservoir [`sampler`] that rate-limits high-cardinality counters,
//! timers and gauges, and a companion [`elide`] tracker that suppresses
//! repeated, unchanged values.
//!
//! Key components:
//! - [`validate`] — StatsD line parser (`key:value|type|@rate`)
//! - [`sampler`] — per-key admission control and reservoir sampling, with
//!   periodic flush and expiry
//! - [`elide`] — per-key "boring value" generation counter with periodic GC
//! - [`clock`] — injectable time source used by `sampler` and `elide`
//! - [`random`] — injectable PRNG used by the timer reservoir
//! - [`timer`] — injectable periodic-callback scheduler, with a thread-based
//!   default implementation
//! - [`config`] — plain, `serde`-deserializable configuration structs
//! - [`error`] — typed error and outcome enums
//!
//! None of these components perform network I/O, read configuration files, or
//! parse command-line flags; those are the host application's job. The core
//! only consumes a clock, a randomness source, a timer scheduler, and emits
//! flushed lines through a callback.

pub mod clock;
pub mod config;
pub mod elide;
pub mod error;
pub mod random;
pub mod sampler;
pub mod timer;
pub mod validate;

pub use config::{ElideConfig, SamplerConfig};
pub use elide::{ElideRuntime, Elider};
pub use error::{ConsiderOutcome, SamplerError, ValidateError};
pub use sampler::{Sampler, SamplerRuntime};
pub use validate::{validate, MetricType, ParsedRecord};

/// Installs a default `tracing` subscriber if the host hasn't set one.
///
/// Safe to call multiple times — subsequent calls are no-ops. Controlled by
/// the `RUST_LOG` env var (e.g. `RUST_LOG=statsrelay_sampling_core=debug`).
/// Hosts that already manage their own `tracing` subscriber do not need to
/// call this at all.
pub fn init() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if tracing::dispatcher::has_been_set() {
            tracing::info!("statsrelay-sampling-core: tracing subscriber already set");
            return;
        }
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_target(true)
            .compact()
            .finish();
        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            tracing::info!("statsrelay-sampling-core initialized");
        }
    });
}
