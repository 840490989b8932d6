//! Concrete benchmark instances produced by family expansion.

use std::fmt::Write as _;
use std::num::NonZero;
use std::sync::Arc;

use crate::benchmark::{Benchmark, BenchmarkBody};
use crate::complexity::BigO;
use crate::run::{AggregationReportMode, TimeUnit};
use crate::statistics::Statistic;

/// One concrete (family, argument tuple, thread count) triple.
///
/// Instances are produced in cross-product order by
/// [`BenchmarkFamilies::find`](crate::BenchmarkFamilies::find); the
/// `family_index` is dense over the families that contributed at least one
/// matching instance, and `per_family_instance_index` enumerates the matched
/// instances of one family.
#[derive(derive_more::Debug)]
pub struct BenchmarkInstance {
    name: String,
    family_name: String,
    #[debug(ignore)]
    body: Arc<BenchmarkBody>,

    family_index: usize,
    per_family_instance_index: usize,
    args: Vec<i64>,
    threads: NonZero<usize>,

    time_unit: TimeUnit,
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

impl BenchmarkInstance {
    pub(crate) fn new(
        family: &Benchmark,
        family_index: usize,
        per_family_instance_index: usize,
        args: &[i64],
        threads: NonZero<usize>,
        show_thread_count: bool,
    ) -> Self {
        Self {
            name: expanded_name(family, args, threads, show_thread_count),
            family_name: family.display_name().to_string(),
            body: Arc::clone(family.body()),
            family_index,
            per_family_instance_index,
            args: args.to_vec(),
            threads,
            time_unit: family.time_unit_setting(),
            min_time: family.min_time_setting(),
            iterations: family.iterations_setting(),
            repetitions: family.repetitions_setting(),
            aggregation_report_mode: family.aggregation_report_mode_setting(),
            measure_process_cpu_time: family.measures_process_cpu_time(),
            use_real_time: family.uses_real_time(),
            use_manual_time: family.uses_manual_time(),
            complexity: family.complexity_setting(),
            statistics: family.statistics_list().to_vec(),
        }
    }

    /// The expanded display name: `family[/arg_name=arg…][/threads:T]`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The registered family name, without argument or thread segments.
    #[must_use]
    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    #[must_use]
    pub fn family_index(&self) -> usize {
        self.family_index
    }

    #[must_use]
    pub fn per_family_instance_index(&self) -> usize {
        self.per_family_instance_index
    }

    #[must_use]
    pub fn args(&self) -> &[i64] {
        &self.args
    }

    #[must_use]
    pub fn threads(&self) -> NonZero<usize> {
        self.threads
    }

    pub(crate) fn body(&self) -> &Arc<BenchmarkBody> {
        &self.body
    }

    pub(crate) fn time_unit(&self) -> TimeUnit {
        self.time_unit
    }

    pub(crate) fn min_time(&self) -> f64 {
        self.min_time
    }

    pub(crate) fn iterations(&self) -> Option<NonZero<u64>> {
        self.iterations
    }

    pub(crate) fn repetitions(&self) -> Option<NonZero<usize>> {
        self.repetitions
    }

    pub(crate) fn aggregation_report_mode(&self) -> AggregationReportMode {
        self.aggregation_report_mode
    }

    pub(crate) fn measure_process_cpu_time(&self) -> bool {
        self.measure_process_cpu_time
    }

    pub(crate) fn use_real_time(&self) -> bool {
        self.use_real_time
    }

    pub(crate) fn use_manual_time(&self) -> bool {
        self.use_manual_time
    }

    pub(crate) fn complexity(&self) -> Option<BigO> {
        self.complexity
    }

    pub(crate) fn statistics(&self) -> &[Statistic] {
        &self.statistics
    }

    /// The independent variable for complexity fitting: the largest element
    /// of the argument tuple, or 1 for argument-less instances.
    pub(crate) fn complexity_n(&self) -> i64 {
        self.args.iter().copied().max().unwrap_or(1)
    }
}

/// Builds the instance display name per the expansion rules: argument
/// segments use the family's argument name hints where provided, and the
/// `threads:` suffix is omitted for the implicit single-thread default.
fn expanded_name(
    family: &Benchmark,
    args: &[i64],
    threads: NonZero<usize>,
    show_thread_count: bool,
) -> String {
    let mut name = family.display_name().to_string();
    let hints = family.arg_name_hints();

    for (position, arg) in args.iter().enumerate() {
        match hints.get(position).filter(|hint| !hint.is_empty()) {
            Some(hint) => write!(name, "/{hint}={arg}").expect("writing to a String cannot fail"),
            None => write!(name, "/{arg}").expect("writing to a String cannot fail"),
        }
    }

    if show_thread_count {
        write!(name, "/threads:{threads}").expect("writing to a String cannot fail");
    }

    name
}

#[cfg(test)]
mod tests {
    use new_zealand::nz;

    use super::*;
    use crate::benchmark::Benchmark;

    fn family() -> Benchmark {
        Benchmark::new("bm", |state| while state.keep_running() {})
    }

    #[test]
    fn plain_name_for_argless_single_threaded_default() {
        let instance = BenchmarkInstance::new(&family(), 0, 0, &[], nz!(1), false);

        assert_eq!(instance.name(), "bm");
    }

    #[test]
    fn arguments_append_as_segments() {
        let instance = BenchmarkInstance::new(&family(), 0, 0, &[3, 7], nz!(1), false);

        assert_eq!(instance.name(), "bm/3/7");
    }

    #[test]
    fn argument_name_hints_are_used_in_order() {
        let bench = family().arg_names(&["rows", "cols"]);
        let instance = BenchmarkInstance::new(&bench, 0, 0, &[3, 7], nz!(1), false);

        assert_eq!(instance.name(), "bm/rows=3/cols=7");
    }

    #[test]
    fn empty_hint_falls_back_to_the_bare_value() {
        let bench = family().arg_names(&["", "cols"]);
        let instance = BenchmarkInstance::new(&bench, 0, 0, &[3, 7], nz!(1), false);

        assert_eq!(instance.name(), "bm/3/cols=7");
    }

    #[test]
    fn thread_suffix_shows_for_registered_thread_lists() {
        let bench = family().threads(nz!(1));
        let instance = BenchmarkInstance::new(&bench, 0, 0, &[5], nz!(1), true);

        assert_eq!(instance.name(), "bm/5/threads:1");
    }

    #[test]
    fn complexity_n_is_the_largest_argument() {
        let instance = BenchmarkInstance::new(&family(), 0, 0, &[3, 64, 7], nz!(1), false);
        assert_eq!(instance.complexity_n(), 64);

        let argless = BenchmarkInstance::new(&family(), 0, 0, &[], nz!(1), false);
        assert_eq!(argless.complexity_n(), 1);
    }
}
