//! Registration, filtering and listing behavior of the driver.

use bench_press::{Benchmark, BenchmarkFamilies, Context, Reporter, Run, Settings};
use new_zealand::nz;

/// Records everything the driver routes to it.
#[derive(Default)]
struct RecordingReporter {
    context_reported: bool,
    batches: Vec<Vec<Run>>,
}

impl RecordingReporter {
    fn run_names(&self) -> Vec<String> {
        self.batches
            .iter()
            .flatten()
            .map(|run| run.run_name.clone())
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn report_context(&mut self, _context: &Context) -> bool {
        self.context_reported = true;
        true
    }

    fn report_runs(&mut self, runs: &[Run]) {
        self.batches.push(runs.to_vec());
    }
}

fn registry_of_five() -> BenchmarkFamilies {
    let families = BenchmarkFamilies::new();
    for name in ["NoPrefix", "BM_Foo", "BM_Bar", "BM_FooBar", "BM_FooBa"] {
        families.add(
            Benchmark::new(name, |state| while state.keep_running() {}).iterations(nz!(8)),
        );
    }
    families
}

fn settings_with_filter(filter: &str) -> Settings {
    Settings {
        filter: filter.to_string(),
        ..Settings::default()
    }
}

fn run_with_filter(
    families: &BenchmarkFamilies,
    settings: &Settings,
    reporter: &mut RecordingReporter,
) -> (usize, String, String) {
    let mut out = Vec::new();
    let mut err = Vec::new();

    let matched = bench_press::run_benchmarks(families, settings, reporter, None, &mut out, &mut err);

    (
        matched,
        String::from_utf8(out).unwrap(),
        String::from_utf8(err).unwrap(),
    )
}

#[test]
fn positive_filter_selects_by_name_prefix() {
    let families = registry_of_five();
    let mut reporter = RecordingReporter::default();

    let (matched, _, _) =
        run_with_filter(&families, &settings_with_filter("BM_Foo"), &mut reporter);

    assert_eq!(matched, 3);
    assert!(reporter.context_reported);
    assert_eq!(reporter.run_names(), vec!["BM_Foo", "BM_FooBar", "BM_FooBa"]);
}

#[test]
fn matched_families_get_dense_family_indices() {
    let families = registry_of_five();
    let mut reporter = RecordingReporter::default();

    run_with_filter(&families, &settings_with_filter("BM_Foo"), &mut reporter);

    let indices: Vec<usize> = reporter
        .batches
        .iter()
        .flatten()
        .map(|run| run.family_index)
        .collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn negative_filter_excludes_matching_names() {
    let families = registry_of_five();
    let mut reporter = RecordingReporter::default();

    let (matched, _, _) =
        run_with_filter(&families, &settings_with_filter("-BM_Foo"), &mut reporter);

    assert_eq!(matched, 2);
    assert_eq!(reporter.run_names(), vec!["NoPrefix", "BM_Bar"]);
}

#[test]
fn list_tests_prints_names_and_runs_nothing() {
    let families = registry_of_five();
    let mut reporter = RecordingReporter::default();

    let settings = Settings {
        list_tests: true,
        ..Settings::default()
    };
    let (matched, out, _) = run_with_filter(&families, &settings, &mut reporter);

    assert_eq!(matched, 5);
    assert_eq!(
        out.lines().collect::<Vec<_>>(),
        vec!["NoPrefix", "BM_Foo", "BM_Bar", "BM_FooBar", "BM_FooBa"]
    );
    assert!(reporter.batches.is_empty());
}

#[test]
fn unmatched_filter_reports_a_diagnostic_and_matches_nothing() {
    let families = registry_of_five();
    let mut reporter = RecordingReporter::default();

    let (matched, _, err) =
        run_with_filter(&families, &settings_with_filter("BM_Nonexistent"), &mut reporter);

    assert_eq!(matched, 0);
    assert!(err.contains("Failed to match any benchmarks"));
    assert!(reporter.batches.is_empty());
}

#[test]
fn invalid_filter_expression_reports_and_matches_nothing() {
    let families = registry_of_five();
    let mut reporter = RecordingReporter::default();

    let (matched, _, err) =
        run_with_filter(&families, &settings_with_filter("[unclosed"), &mut reporter);

    assert_eq!(matched, 0);
    assert!(err.contains("could not compile benchmark filter"));
}

#[test]
fn empty_and_all_filters_match_everything() {
    for filter in ["", "all"] {
        let families = registry_of_five();
        let mut reporter = RecordingReporter::default();

        let (matched, _, _) =
            run_with_filter(&families, &settings_with_filter(filter), &mut reporter);

        assert_eq!(matched, 5, "filter {filter:?}");
    }
}
