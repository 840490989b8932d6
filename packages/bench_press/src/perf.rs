//! Hardware performance counter collection interface.
//!
//! The harness itself contains no counter backend; a platform-specific
//! implementation of [`PerfCounterBackend`] is registered process-wide and
//! driven around the timed portion of each repetition. Collected values are
//! folded into the run's user counters, averaged per iteration.

use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

use crate::counter::{Counter, CounterFlags, UserCounters};

/// A source of hardware performance counter readings.
pub trait PerfCounterBackend: Debug + Send + Sync + 'static {
    /// Whether this backend can collect the named counter.
    fn supports(&self, name: &str) -> bool;

    /// Begins a collection window for the named counters.
    fn start(&self, names: &[String]);

    /// Ends the current collection window, returning one reading per name in
    /// the same order the names were passed to [`start`](Self::start).
    fn stop_and_read(&self, names: &[String]) -> Vec<f64>;
}

static PERF_COUNTER_BACKEND: OnceLock<Arc<dyn PerfCounterBackend>> = OnceLock::new();

/// Registers the process-wide performance counter backend.
///
/// Only the first registration takes effect; later calls are ignored with a
/// diagnostic.
pub fn register_perf_counter_backend(backend: Arc<dyn PerfCounterBackend>) {
    if PERF_COUNTER_BACKEND.set(backend).is_err() {
        tracing::warn!("a perf counter backend is already registered; ignoring");
    }
}

pub(crate) fn registered_backend() -> Option<Arc<dyn PerfCounterBackend>> {
    PERF_COUNTER_BACKEND.get().map(Arc::clone)
}

/// Drives the registered backend across the timed sections of a repetition.
#[derive(Debug)]
pub(crate) struct PerfCountersMeasurement {
    backend: Arc<dyn PerfCounterBackend>,
    names: Vec<String>,
}

impl PerfCountersMeasurement {
    /// Creates a measurement for the named counters, or `None` when no
    /// counters are requested or the backend cannot collect one of them.
    pub(crate) fn create(
        names: &[String],
        backend: Option<Arc<dyn PerfCounterBackend>>,
    ) -> Option<Self> {
        if names.is_empty() {
            return None;
        }

        let Some(backend) = backend else {
            tracing::warn!(
                ?names,
                "perf counters were requested but no backend is registered"
            );
            return None;
        };

        for name in names {
            if !backend.supports(name) {
                tracing::warn!(counter = %name, "perf counter is not supported by the backend");
                return None;
            }
        }

        Some(Self {
            backend,
            names: names.to_vec(),
        })
    }

    pub(crate) fn start(&self) {
        self.backend.start(&self.names);
    }

    /// Stops collection and folds the readings into `counters`, averaged per
    /// iteration on finalize.
    pub(crate) fn stop_and_record(&self, counters: &mut UserCounters) {
        let readings = self.backend.stop_and_read(&self.names);
        debug_assert_eq!(readings.len(), self.names.len());

        for (name, value) in self.names.iter().zip(readings) {
            counters
                .entry(name.clone())
                .and_modify(|c| c.value += value)
                .or_insert_with(|| Counter::new(value, CounterFlags::AVG_ITERATIONS));
        }
    }
}
