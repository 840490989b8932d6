//! Measurement records produced by the runner and consumed by reporters.

use std::ops::BitOr;

use crate::complexity::BigO;
use crate::counter::UserCounters;

/// The unit in which a benchmark's per-iteration times are reported.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TimeUnit {
    #[default]
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
}

impl TimeUnit {
    /// The abbreviation reporters print after a time value.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Nanosecond => "ns",
            Self::Microsecond => "us",
            Self::Millisecond => "ms",
            Self::Second => "s",
        }
    }

    /// The factor converting seconds into this unit.
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Nanosecond => 1e9,
            Self::Microsecond => 1e6,
            Self::Millisecond => 1e3,
            Self::Second => 1.0,
        }
    }
}

/// How the per-repetition runs and the aggregate runs of an instance are
/// routed to reporters. Combinable as flags; `Unspecified` defers to the
/// global settings.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AggregationReportMode(u8);

impl AggregationReportMode {
    /// No instance-level preference; the global flags decide.
    pub const UNSPECIFIED: Self = Self(0);

    /// An explicit preference was stated (possibly "report everything").
    pub const DEFAULT: Self = Self(1 << 0);

    /// The file reporter receives only aggregate runs.
    pub const FILE_REPORT_AGGREGATES_ONLY: Self = Self(1 << 1);

    /// The display reporter receives only aggregate runs.
    pub const DISPLAY_REPORT_AGGREGATES_ONLY: Self = Self(1 << 2);

    /// Both reporters receive only aggregate runs.
    pub const REPORT_AGGREGATES_ONLY: Self =
        Self(1 << 0 | 1 << 1 | 1 << 2);

    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub fn is_unspecified(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for AggregationReportMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Memory usage observed by a registered [`MemoryManager`] across the first
/// repetition of an instance.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MemoryUsage {
    pub num_allocs: i64,
    pub max_bytes_used: i64,
}

/// Brackets a measured region to observe allocator behavior.
///
/// Registered process-wide via
/// [`register_memory_manager`](crate::register_memory_manager); the runner
/// brackets one extra single-iteration pass of each instance's first
/// repetition with [`start`](Self::start) / [`stop`](Self::stop).
pub trait MemoryManager: Send + Sync + 'static {
    /// Called once before the bracketed region begins.
    fn start(&self);

    /// Called once after the bracketed region ends, returning what was
    /// observed since [`start`](Self::start).
    fn stop(&self) -> MemoryUsage;
}

/// One completed repetition of one benchmark instance, aggregated across its
/// worker threads, or a synthetic aggregate derived from such repetitions.
///
/// Accumulated times are in seconds. For manual-time benchmarks the manually
/// reported time substitutes for the wall-clock time in
/// `real_accumulated_time` (the raw manual accumulation is also retained in
/// `manual_accumulated_time`).
#[derive(Clone, Debug)]
pub struct Run {
    pub run_name: String,
    pub family_index: usize,
    pub per_family_instance_index: usize,

    /// The calibrated per-thread iteration count of the repetition, or zero
    /// for synthetic complexity-fit rows.
    pub iterations: u64,
    pub real_accumulated_time: f64,
    pub cpu_accumulated_time: f64,
    pub manual_accumulated_time: f64,

    /// `None` for per-repetition runs; the statistic (or fit row) name for
    /// synthesized aggregates, whose `run_name` carries it as a suffix.
    pub aggregate_name: Option<String>,

    pub threads: usize,
    pub time_unit: TimeUnit,
    pub report_label: String,
    pub error_occurred: bool,
    pub error_message: String,
    pub counters: UserCounters,

    /// The value of the independent variable for complexity fitting: the
    /// largest element of the instance's argument tuple.
    pub complexity_n: i64,
    pub complexity: Option<BigO>,
    pub report_big_o: bool,
    pub report_rms: bool,

    pub memory_usage: Option<MemoryUsage>,
}

impl Run {
    pub(crate) fn new(run_name: String, family_index: usize, per_family_instance_index: usize) -> Self {
        Self {
            run_name,
            family_index,
            per_family_instance_index,
            iterations: 0,
            aggregate_name: None,
            real_accumulated_time: 0.0,
            cpu_accumulated_time: 0.0,
            manual_accumulated_time: 0.0,
            threads: 1,
            time_unit: TimeUnit::default(),
            report_label: String::new(),
            error_occurred: false,
            error_message: String::new(),
            counters: UserCounters::new(),
            complexity_n: 0,
            complexity: None,
            report_big_o: false,
            report_rms: false,
            memory_usage: None,
        }
    }

    /// The reported per-iteration real time, expressed in the run's time
    /// unit. Complexity-fit rows (iteration count zero) report their value
    /// undivided.
    #[must_use]
    pub fn adjusted_real_time(&self) -> f64 {
        self.adjust(self.real_accumulated_time)
    }

    /// The reported per-iteration processor time, expressed in the run's
    /// time unit.
    #[must_use]
    pub fn adjusted_cpu_time(&self) -> f64 {
        self.adjust(self.cpu_accumulated_time)
    }

    fn adjust(&self, seconds: f64) -> f64 {
        let value = seconds * self.time_unit.multiplier();
        if self.iterations != 0 {
            value / self.iterations as f64
        } else {
            value
        }
    }
}

/// Everything one instance produced, handed to reporters once the instance's
/// final repetition completes.
#[derive(Clone, Debug, Default)]
pub struct RunResults {
    /// One [`Run`] per repetition.
    pub non_aggregates: Vec<Run>,

    /// Runs synthesized by the statistic descriptors, plus the complexity
    /// fit rows for the final instance of a family with a complexity spec.
    pub aggregates_only: Vec<Run>,

    pub display_report_aggregates_only: bool,
    pub file_report_aggregates_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_unit_conversions() {
        assert_eq!(TimeUnit::Nanosecond.label(), "ns");
        assert_eq!(TimeUnit::Second.multiplier(), 1.0);
        assert_eq!(TimeUnit::Millisecond.multiplier(), 1e3);
    }

    #[test]
    fn adjusted_times_divide_by_iterations() {
        let mut run = Run::new("bm".to_string(), 0, 0);
        run.iterations = 100;
        run.real_accumulated_time = 2.0;
        run.cpu_accumulated_time = 1.0;
        run.time_unit = TimeUnit::Microsecond;

        assert_eq!(run.adjusted_real_time(), 2.0 * 1e6 / 100.0);
        assert_eq!(run.adjusted_cpu_time(), 1.0 * 1e6 / 100.0);
    }

    #[test]
    fn zero_iterations_reports_undivided() {
        let mut run = Run::new("bm_BigO".to_string(), 0, 0);
        run.real_accumulated_time = 3.5;
        run.time_unit = TimeUnit::Second;

        assert_eq!(run.adjusted_real_time(), 3.5);
    }

    // Runs are handed across threads to reporters.
    static_assertions::assert_impl_all!(Run: Send, Sync, Clone);
    static_assertions::assert_impl_all!(RunResults: Send, Sync);

    #[test]
    fn report_aggregates_only_implies_both_reporters() {
        let mode = AggregationReportMode::REPORT_AGGREGATES_ONLY;

        assert!(mode.contains(AggregationReportMode::DEFAULT));
        assert!(mode.contains(AggregationReportMode::FILE_REPORT_AGGREGATES_ONLY));
        assert!(mode.contains(AggregationReportMode::DISPLAY_REPORT_AGGREGATES_ONLY));
        assert!(!mode.is_unspecified());
    }
}
