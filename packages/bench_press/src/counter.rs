//! User-defined counters attached to benchmark runs.

use std::collections::BTreeMap;
use std::ops::BitOr;

/// User counters keyed by name.
///
/// An ordered map so reporters emit counters in a deterministic order.
pub type UserCounters = BTreeMap<String, Counter>;

/// Interpretation flags for a [`Counter`], applied when a run is finalized.
///
/// Flags combine with `|`: `CounterFlags::IS_RATE | CounterFlags::AVG_THREADS`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CounterFlags(u32);

impl CounterFlags {
    /// The counter value is reported as-is.
    pub const DEFAULTS: Self = Self(0);

    /// Report as a rate: divide the value by the elapsed time of the run.
    pub const IS_RATE: Self = Self(1 << 0);

    /// Report per thread: divide the value by the number of worker threads.
    pub const AVG_THREADS: Self = Self(1 << 1);

    /// The value is the same for every iteration: multiply by the iteration
    /// count so that the reported total scales with the run.
    pub const IS_ITERATION_INVARIANT: Self = Self(1 << 2);

    /// Report per iteration: divide the value by the iteration count.
    pub const AVG_ITERATIONS: Self = Self(1 << 3);

    /// Report the inverse of the accumulated value.
    pub const INVERT: Self = Self(1 << 31);

    /// Whether every flag in `other` is set in `self`.
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CounterFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A single user counter: an accumulated value plus interpretation flags.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Counter {
    pub value: f64,
    pub flags: CounterFlags,
}

impl Counter {
    #[must_use]
    pub fn new(value: f64, flags: CounterFlags) -> Self {
        Self { value, flags }
    }

    /// Applies this counter's flags to its accumulated value, producing the
    /// value a reporter should show.
    ///
    /// `iterations` is the total iteration count of the run summed across
    /// worker threads, `elapsed_seconds` the run's mode-selected measurement
    /// time and `threads` the worker count.
    #[must_use]
    pub(crate) fn finish(self, iterations: u64, elapsed_seconds: f64, threads: usize) -> f64 {
        let mut value = self.value;

        if self.flags.contains(CounterFlags::IS_RATE) {
            value /= elapsed_seconds;
        }
        if self.flags.contains(CounterFlags::AVG_THREADS) {
            value /= threads as f64;
        }
        if self.flags.contains(CounterFlags::IS_ITERATION_INVARIANT) {
            value *= iterations as f64;
        }
        if self.flags.contains(CounterFlags::AVG_ITERATIONS) {
            value /= iterations as f64;
        }
        if self.flags.contains(CounterFlags::INVERT) {
            value = 1.0 / value;
        }

        value
    }
}

impl From<f64> for Counter {
    fn from(value: f64) -> Self {
        Self::new(value, CounterFlags::DEFAULTS)
    }
}

/// Merges per-thread counter contributions into a shared accumulator.
///
/// Values for the same key sum; the flags of the first contribution win.
pub(crate) fn increment(target: &mut UserCounters, contribution: &UserCounters) {
    for (name, counter) in contribution {
        target
            .entry(name.clone())
            .and_modify(|existing| existing.value += counter.value)
            .or_insert(*counter);
    }
}

/// Applies [`Counter::finish`] to every counter in the map.
pub(crate) fn finish_all(
    counters: &mut UserCounters,
    iterations: u64,
    elapsed_seconds: f64,
    threads: usize,
) {
    for counter in counters.values_mut() {
        counter.value = counter.finish(iterations, elapsed_seconds, threads);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_value_through() {
        let counter = Counter::new(42.0, CounterFlags::DEFAULTS);

        assert_eq!(counter.finish(1000, 2.0, 4), 42.0);
    }

    #[test]
    fn rate_divides_by_elapsed_time() {
        let counter = Counter::new(42.0, CounterFlags::IS_RATE);

        assert_eq!(counter.finish(1000, 2.0, 4), 21.0);
    }

    #[test]
    fn avg_threads_divides_by_thread_count() {
        let counter = Counter::new(42.0, CounterFlags::AVG_THREADS);

        assert_eq!(counter.finish(1000, 2.0, 4), 10.5);
    }

    #[test]
    fn iteration_invariant_multiplies_by_iterations() {
        let counter = Counter::new(2.0, CounterFlags::IS_ITERATION_INVARIANT);

        assert_eq!(counter.finish(1000, 2.0, 4), 2000.0);
    }

    #[test]
    fn avg_iterations_divides_by_iterations() {
        let counter = Counter::new(2000.0, CounterFlags::AVG_ITERATIONS);

        assert_eq!(counter.finish(1000, 2.0, 4), 2.0);
    }

    #[test]
    fn combined_rate_per_thread() {
        let counter = Counter::new(80.0, CounterFlags::IS_RATE | CounterFlags::AVG_THREADS);

        assert_eq!(counter.finish(1000, 2.0, 4), 10.0);
    }

    #[test]
    fn invert_reports_inverse() {
        let counter = Counter::new(4.0, CounterFlags::INVERT);

        assert_eq!(counter.finish(1, 1.0, 1), 0.25);
    }

    #[test]
    fn increment_sums_matching_keys_and_keeps_first_flags() {
        let mut target = UserCounters::new();
        target.insert("items".to_string(), Counter::new(10.0, CounterFlags::IS_RATE));

        let mut contribution = UserCounters::new();
        contribution.insert("items".to_string(), Counter::new(5.0, CounterFlags::DEFAULTS));
        contribution.insert("bytes".to_string(), Counter::new(7.0, CounterFlags::DEFAULTS));

        increment(&mut target, &contribution);

        assert_eq!(target["items"].value, 15.0);
        assert_eq!(target["items"].flags, CounterFlags::IS_RATE);
        assert_eq!(target["bytes"].value, 7.0);
    }
}
