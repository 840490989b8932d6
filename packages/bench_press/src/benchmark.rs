//! Benchmark family definitions.

use std::num::NonZero;
use std::sync::Arc;

use itertools::Itertools;
use new_zealand::nz;

use crate::complexity::BigO;
use crate::ranges::add_range;
use crate::run::{AggregationReportMode, TimeUnit};
use crate::state::State;
use crate::statistics::{self, Statistic, StatisticFn};

/// The callable measured by a benchmark family.
pub type BenchmarkBody = dyn Fn(&mut State<'_>) + Send + Sync + 'static;

/// For non-dense ranges, intermediate values are powers of this multiplier
/// unless overridden via [`Benchmark::range_multiplier`].
const DEFAULT_RANGE_MULTIPLIER: i64 = 8;

/// A registered benchmark family: a body plus the attribute set that governs
/// how its instances are expanded and measured.
///
/// Built fluently and then handed to a
/// [`BenchmarkFamilies`](crate::BenchmarkFamilies) registry (or the
/// process-wide [`register_benchmark`](crate::register_benchmark)):
///
/// ```
/// use bench_press::{Benchmark, BenchmarkFamilies};
/// use new_zealand::nz;
///
/// let mut families = BenchmarkFamilies::new();
/// families.add(
///     Benchmark::new("sum_range", |state| {
///         let n = state.range(0);
///         while state.keep_running() {
///             bench_press::do_not_optimize((0..n).sum::<i64>());
///         }
///     })
///     .range(8, 512)
///     .threads(nz!(2)),
/// );
/// ```
#[derive(derive_more::Debug)]
pub struct Benchmark {
    name: String,
    #[debug(ignore)]
    body: Arc<BenchmarkBody>,

    args: Vec<Vec<i64>>,
    arg_names: Vec<String>,
    thread_counts: Vec<NonZero<usize>>,

    time_unit: TimeUnit,
    range_multiplier: i64,
    min_time: f64,
    iterations: Option<NonZero<u64>>,
    repetitions: Option<NonZero<usize>>,
    aggregation_report_mode: AggregationReportMode,
    measure_process_cpu_time: bool,
    use_real_time: bool,
    use_manual_time: bool,
    complexity: Option<BigO>,
    statistics: Vec<Statistic>,
}

impl Benchmark {
    /// Creates a family measuring `body` under the given name.
    pub fn new(name: impl Into<String>, body: impl Fn(&mut State<'_>) + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            body: Arc::new(body),
            args: Vec::new(),
            arg_names: Vec::new(),
            thread_counts: Vec::new(),
            time_unit: TimeUnit::default(),
            range_multiplier: DEFAULT_RANGE_MULTIPLIER,
            min_time: 0.0,
            iterations: None,
            repetitions: None,
            aggregation_report_mode: AggregationReportMode::UNSPECIFIED,
            measure_process_cpu_time: false,
            use_real_time: false,
            use_manual_time: false,
            complexity: None,
            statistics: statistics::default_statistics(),
        }
    }

    /// Renames the family.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Appends a single-element argument tuple.
    #[must_use]
    pub fn arg(mut self, value: i64) -> Self {
        self.assert_arity(1);
        self.args.push(vec![value]);
        self
    }

    /// Appends one argument tuple; its arity must match the family's.
    #[must_use]
    pub fn args(mut self, values: &[i64]) -> Self {
        self.assert_arity(values.len());
        self.args.push(values.to_vec());
        self
    }

    /// Appends single-element tuples for the multiplicative range
    /// `[start … limit]`, using the family's range multiplier.
    #[must_use]
    pub fn range(mut self, start: i64, limit: i64) -> Self {
        self.assert_arity(1);

        let mut values = Vec::new();
        add_range(&mut values, start, limit, self.range_multiplier);
        for value in values {
            self.args.push(vec![value]);
        }
        self
    }

    /// Appends the cross-product of one multiplicative range per tuple
    /// position.
    #[must_use]
    pub fn ranges(mut self, ranges: &[(i64, i64)]) -> Self {
        self.assert_arity(ranges.len());

        let lists: Vec<Vec<i64>> = ranges
            .iter()
            .map(|&(start, limit)| {
                let mut values = Vec::new();
                add_range(&mut values, start, limit, self.range_multiplier);
                values
            })
            .collect();

        self.push_product(&lists);
        self
    }

    /// Appends the cross-product of the given value lists, in row-major
    /// order with the last position varying fastest.
    #[must_use]
    pub fn args_product(mut self, lists: &[Vec<i64>]) -> Self {
        self.assert_arity(lists.len());
        self.push_product(lists);
        self
    }

    /// Appends single-element tuples `start, start+step, … ≤ limit`.
    #[must_use]
    pub fn dense_range(mut self, start: i64, limit: i64, step: i64) -> Self {
        self.assert_arity(1);
        assert!(start <= limit, "range lower bound must not exceed the upper bound");

        let mut value = start;
        while value <= limit {
            self.args.push(vec![value]);
            value += step;
        }
        self
    }

    /// Names the single argument position for display-name rendering.
    #[must_use]
    pub fn arg_name(mut self, name: impl Into<String>) -> Self {
        self.assert_arity(1);
        self.arg_names = vec![name.into()];
        self
    }

    /// Names the argument positions for display-name rendering.
    #[must_use]
    pub fn arg_names(mut self, names: &[&str]) -> Self {
        self.assert_arity(names.len());
        self.arg_names = names.iter().map(|&n| n.to_string()).collect();
        self
    }

    /// Overrides the multiplier used by subsequent [`range`](Self::range) /
    /// [`ranges`](Self::ranges) calls.
    ///
    /// # Panics
    ///
    /// Panics when `multiplier <= 1`.
    #[must_use]
    pub fn range_multiplier(mut self, multiplier: i64) -> Self {
        assert!(multiplier > 1, "range multiplier must be greater than one");
        self.range_multiplier = multiplier;
        self
    }

    /// Applies a free function to the builder, for shared argument setups.
    #[must_use]
    pub fn apply(self, f: impl FnOnce(Self) -> Self) -> Self {
        f(self)
    }

    /// Sets the minimum measurement time the calibration loop targets, in
    /// seconds.
    ///
    /// # Panics
    ///
    /// Panics when `seconds` is not positive or a fixed iteration count was
    /// already set.
    #[must_use]
    pub fn min_time(mut self, seconds: f64) -> Self {
        assert!(seconds > 0.0, "minimum measurement time must be positive");
        assert!(
            self.iterations.is_none(),
            "a fixed iteration count and a minimum time are mutually exclusive"
        );
        self.min_time = seconds;
        self
    }

    /// Fixes the iteration count, skipping calibration entirely.
    ///
    /// # Panics
    ///
    /// Panics when a minimum measurement time was already set.
    #[must_use]
    pub fn iterations(mut self, n: NonZero<u64>) -> Self {
        assert!(
            self.min_time == 0.0,
            "a fixed iteration count and a minimum time are mutually exclusive"
        );
        self.iterations = Some(n);
        self
    }

    /// Sets how many repetitions each instance runs.
    #[must_use]
    pub fn repetitions(mut self, n: NonZero<usize>) -> Self {
        self.repetitions = Some(n);
        self
    }

    /// Routes only aggregate runs (not per-repetition runs) to every
    /// reporter.
    #[must_use]
    pub fn report_aggregates_only(mut self, value: bool) -> Self {
        self.aggregation_report_mode = if value {
            AggregationReportMode::REPORT_AGGREGATES_ONLY
        } else {
            AggregationReportMode::DEFAULT
        };
        self
    }

    /// Routes only aggregate runs to the display reporter; the file reporter
    /// still receives everything.
    #[must_use]
    pub fn display_aggregates_only(mut self, value: bool) -> Self {
        // Either way the mode is no longer unspecified.
        self.aggregation_report_mode = self.aggregation_report_mode | AggregationReportMode::DEFAULT;

        if value {
            self.aggregation_report_mode =
                self.aggregation_report_mode | AggregationReportMode::DISPLAY_REPORT_AGGREGATES_ONLY;
        }
        self
    }

    /// Measures process-wide processor time instead of per-thread processor
    /// time. Combinable with real-time or manual-time selection.
    #[must_use]
    pub fn measure_process_cpu_time(mut self) -> Self {
        self.measure_process_cpu_time = true;
        self
    }

    /// Calibrates against and reports wall-clock time instead of processor
    /// time.
    ///
    /// # Panics
    ///
    /// Panics when manual timing was already elected.
    #[must_use]
    pub fn use_real_time(mut self) -> Self {
        assert!(
            !self.use_manual_time,
            "cannot elect real time and manual time simultaneously"
        );
        self.use_real_time = true;
        self
    }

    /// Calibrates against and reports manually measured time (via
    /// [`State::set_iteration_time`]).
    ///
    /// # Panics
    ///
    /// Panics when real timing was already elected.
    #[must_use]
    pub fn use_manual_time(mut self) -> Self {
        assert!(
            !self.use_real_time,
            "cannot elect real time and manual time simultaneously"
        );
        self.use_manual_time = true;
        self
    }

    /// Fits the given complexity curve across the family once every instance
    /// has completed.
    #[must_use]
    pub fn complexity(mut self, big_o: BigO) -> Self {
        self.complexity = Some(big_o);
        self
    }

    /// Attaches an additional statistic computed across repetitions.
    #[must_use]
    pub fn compute_statistics(mut self, name: impl Into<String>, compute: StatisticFn) -> Self {
        self.statistics.push(Statistic::new(name, compute));
        self
    }

    /// Sets the unit per-iteration times are reported in.
    #[must_use]
    pub fn unit(mut self, time_unit: TimeUnit) -> Self {
        self.time_unit = time_unit;
        self
    }

    /// Adds a thread count the family's instances fan out over.
    #[must_use]
    pub fn threads(mut self, count: NonZero<usize>) -> Self {
        self.thread_counts.push(count);
        self
    }

    /// Adds thread counts `min, min*2, min*4, … max` (always including
    /// `max`).
    #[must_use]
    pub fn thread_range(mut self, min: NonZero<usize>, max: NonZero<usize>) -> Self {
        assert!(max >= min, "thread range upper bound must not be below the lower bound");

        let mut counts = Vec::new();
        add_range(&mut counts, min.get() as i64, max.get() as i64, 2);
        for count in counts {
            self.thread_counts
                .push(NonZero::new(count as usize).expect("range values are positive"));
        }
        self
    }

    /// Adds thread counts `min, min+stride, … max` (always including `max`).
    #[must_use]
    pub fn dense_thread_range(
        mut self,
        min: NonZero<usize>,
        max: NonZero<usize>,
        stride: usize,
    ) -> Self {
        assert!(max >= min, "thread range upper bound must not be below the lower bound");
        assert!(stride >= 1, "thread range stride must be at least one");

        let mut count = min.get();
        while count < max.get() {
            self.thread_counts
                .push(NonZero::new(count).expect("counts start from a NonZero minimum"));
            count += stride;
        }
        self.thread_counts.push(max);
        self
    }

    /// Adds one thread per processor available to this process.
    #[must_use]
    pub fn thread_per_cpu(mut self) -> Self {
        self.thread_counts
            .push(std::thread::available_parallelism().unwrap_or(nz!(1)));
        self
    }

    fn push_product(&mut self, lists: &[Vec<i64>]) {
        for tuple in lists.iter().map(|list| list.iter().copied()).multi_cartesian_product() {
            self.args.push(tuple);
        }
    }

    /// The arity every pushed argument tuple must have, once established.
    fn arity(&self) -> Option<usize> {
        if let Some(first) = self.args.first() {
            return Some(first.len());
        }
        if self.arg_names.is_empty() {
            None
        } else {
            Some(self.arg_names.len())
        }
    }

    fn assert_arity(&self, pushed: usize) {
        assert!(pushed >= 1, "argument tuples must have at least one element");
        if let Some(arity) = self.arity() {
            assert_eq!(
                arity, pushed,
                "argument tuple arity does not match the family's established arity"
            );
        }
    }

    pub(crate) fn display_name(&self) -> &str {
        &self.name
    }

    pub(crate) fn body(&self) -> &Arc<BenchmarkBody> {
        &self.body
    }

    pub(crate) fn arg_tuples(&self) -> &[Vec<i64>] {
        &self.args
    }

    pub(crate) fn arg_name_hints(&self) -> &[String] {
        &self.arg_names
    }

    pub(crate) fn thread_count_list(&self) -> &[NonZero<usize>] {
        &self.thread_counts
    }

    pub(crate) fn time_unit_setting(&self) -> TimeUnit {
        self.time_unit
    }

    pub(crate) fn min_time_setting(&self) -> f64 {
        self.min_time
    }

    pub(crate) fn iterations_setting(&self) -> Option<NonZero<u64>> {
        self.iterations
    }

    pub(crate) fn repetitions_setting(&self) -> Option<NonZero<usize>> {
        self.repetitions
    }

    pub(crate) fn aggregation_report_mode_setting(&self) -> AggregationReportMode {
        self.aggregation_report_mode
    }

    pub(crate) fn measures_process_cpu_time(&self) -> bool {
        self.measure_process_cpu_time
    }

    pub(crate) fn uses_real_time(&self) -> bool {
        self.use_real_time
    }

    pub(crate) fn uses_manual_time(&self) -> bool {
        self.use_manual_time
    }

    pub(crate) fn complexity_setting(&self) -> Option<BigO> {
        self.complexity
    }

    pub(crate) fn statistics_list(&self) -> &[Statistic] {
        &self.statistics
    }
}
