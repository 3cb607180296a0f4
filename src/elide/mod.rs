//! Value elision tracker.
//!
//! Suppresses repeated, unchanged observations of a key: each `mark` bumps a
//! per-key generation counter a caller can compare against a decision policy
//! (e.g. "only emit every Nth unchanged generation"); `unmark` resets it the
//! moment the value actually changes.

pub mod runtime;

use crate::clock::Clock;
use std::collections::HashMap;
use std::sync::Arc;

pub use runtime::ElideRuntime;

struct ElideEntry {
    generations: i64,
    last_seen_secs: i64,
}

/// Per-key "boring value" generation tracker with periodic expiry.
///
/// Owns its map directly rather than going through an injectable keyed-map
/// capability: Rust's ownership model makes the source's iterate-then-destroy
/// double-free hazard structurally impossible, so `Drop` alone frees every
/// entry exactly once.
pub struct Elider {
    entries: HashMap<String, ElideEntry>,
    skip: i64,
    clock: Arc<dyn Clock>,
}

impl Elider {
    /// Creates an elision tracker. `skip` is added to every reported
    /// generation (jitter/offset): the first `skip` marks of a new key
    /// return `skip, skip + 1, …`.
    pub fn new(skip: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            skip,
            clock,
        }
    }

    /// Creates an elision tracker using the system clock.
    pub fn with_system_clock(skip: i64) -> Self {
        Self::new(skip, Arc::new(crate::clock::SystemClock))
    }

    /// Records that `key` was observed with an unchanged value. Returns the
    /// entry's pre-increment generation count. A missing entry is created
    /// with initial generation `skip`.
    pub fn mark(&mut self, key: &str) -> i64 {
        let now = self.clock.now_coarse();
        let skip = self.skip;
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| ElideEntry {
                generations: skip,
                last_seen_secs: now,
            });
        entry.last_seen_secs = now;
        let reported = entry.generations;
        entry.generations += 1;
        reported
    }

    /// Records that `key`'s value changed. Resets its generation back to
    /// `skip` and updates `last_seen`. A missing entry is created.
    pub fn unmark(&mut self, key: &str) -> i64 {
        let now = self.clock.now_coarse();
        let skip = self.skip;
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| ElideEntry {
                generations: skip,
                last_seen_secs: now,
            });
        entry.last_seen_secs = now;
        entry.generations = skip;
        skip
    }

    /// Removes every entry whose `last_seen` is at or before `cutoff_secs`
    /// (whole-second comparison, sub-second precision intentionally
    /// ignored). Returns the number of entries removed.
    pub fn gc(&mut self, cutoff_secs: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, v| v.last_seen_secs > cutoff_secs);
        before - self.entries.len()
    }

    /// Runs a GC sweep relative to the tracker's own clock: the cutoff is
    /// `now - ttl_secs`, matching the source's `elide_gc_callback_handler`
    /// computing `cutoff.tv_sec = gettimeofday() - gc_ttl` on every tick. A
    /// negative `ttl_secs` disables the sweep, matching [`crate::sampler::Sampler::expire`]'s
    /// `-1` convention, and always returns `0`.
    pub fn gc_idle(&mut self, ttl_secs: i64) -> usize {
        if ttl_secs < 0 {
            return 0;
        }
        let cutoff = self.clock.now_coarse() - ttl_secs;
        self.gc(cutoff)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FakeClock;

    fn elider_with_clock(skip: i64) -> (Elider, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::new(0));
        let elider = Elider::new(skip, clock.clone());
        (elider, clock)
    }

    #[test]
    fn mark_reports_skip_then_increments() {
        let (mut e, clock) = elider_with_clock(3);
        assert_eq!(e.mark("k"), 3);
        clock.advance(1);
        assert_eq!(e.mark("k"), 4);
    }

    #[test]
    fn unmark_resets_to_skip() {
        let (mut e, clock) = elider_with_clock(3);
        assert_eq!(e.mark("k"), 3);
        clock.advance(1);
        assert_eq!(e.mark("k"), 4);
        clock.advance(1);
        assert_eq!(e.unmark("k"), 3);
        assert_eq!(e.mark("k"), 3);
    }

    #[test]
    fn independent_keys_have_independent_generations() {
        let (mut e, _clock) = elider_with_clock(0);
        assert_eq!(e.mark("a"), 0);
        assert_eq!(e.mark("a"), 1);
        assert_eq!(e.mark("b"), 0);
    }

    #[test]
    fn gc_removes_exactly_expired_entries() {
        let (mut e, clock) = elider_with_clock(0);
        e.mark("old");
        clock.advance(100);
        e.mark("new");
        assert_eq!(e.len(), 2);

        let removed = e.gc(50);
        assert_eq!(removed, 1);
        assert_eq!(e.len(), 1);
        assert_eq!(e.mark("new"), 1);
    }

    #[test]
    fn gc_boundary_is_inclusive_of_cutoff() {
        let (mut e, clock) = elider_with_clock(0);
        clock.set(100);
        e.mark("k");
        // last_seen.tv_sec (100) <= cutoff (100) => removed.
        assert_eq!(e.gc(100), 1);
        assert!(e.is_empty());
    }

    #[test]
    fn gc_idle_uses_clock_relative_cutoff() {
        let (mut e, clock) = elider_with_clock(0);
        e.mark("old");
        clock.advance(1000);
        assert_eq!(e.gc_idle(500), 1);
        assert!(e.is_empty());
    }

    #[test]
    fn gc_idle_disabled_for_negative_ttl() {
        let (mut e, clock) = elider_with_clock(0);
        e.mark("old");
        clock.advance(1_000_000);
        assert_eq!(e.gc_idle(-1), 0);
        assert_eq!(e.len(), 1);
    }

    #[test]
    fn gc_keeps_entries_strictly_newer_than_cutoff() {
        let (mut e, clock) = elider_with_clock(0);
        clock.set(101);
        e.mark("k");
        assert_eq!(e.gc(100), 0);
        assert_eq!(e.len(), 1);
    }
}
