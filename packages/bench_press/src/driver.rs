//! The execution driver: filtering, scheduling, and result routing.

use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use foldhash::{HashMap, HashMapExt};
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::ERR_POISONED_LOCK;
use crate::complexity;
use crate::config::{self, ColorMode, ConfigError, Settings};
use crate::filter::BenchmarkFilter;
use crate::instance::BenchmarkInstance;
use crate::pal::PlatformFacade;
use crate::perf::{self, PerfCountersMeasurement};
use crate::registry::{BenchmarkFamilies, global_families};
use crate::reporter::{Context, Reporter, create_reporter};
use crate::run::{MemoryManager, Run, RunResults};
use crate::runner::BenchmarkRunner;

/// Errors that abort an execution before any benchmark runs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DriverError {
    /// A custom file reporter was supplied without configuring an output
    /// file to pair it with.
    #[error("a file reporter was provided but no output file was configured")]
    FileReporterRequiresOutputFile,

    /// The configured output file could not be opened.
    #[error("invalid output file name: '{path}'")]
    InvalidOutputFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Parses the recognized configuration options, establishes the process-wide
/// settings and global context, and returns the arguments the harness did
/// not consume.
///
/// Invalid options are a configuration error; hosts conventionally exit with
/// code 1 when this fails.
pub fn initialize<S: AsRef<str>>(args: &[S]) -> Result<Vec<String>, ConfigError> {
    let (settings, rest) = Settings::from_args(args)?;

    for (key, value) in &settings.context {
        add_custom_context(key, value);
    }

    tracing::debug!(verbosity = settings.verbosity, "benchmark harness initialized");
    config::set_global_settings(settings);

    Ok(rest)
}

/// Releases process-wide state established by [`initialize`] and
/// [`add_custom_context`].
pub fn shutdown() {
    global_context().lock().expect(ERR_POISONED_LOCK).clear();
}

/// Adds a key/value pair to the context reported before any runs.
///
/// A key that is already present keeps its existing value.
pub fn add_custom_context(key: &str, value: &str) {
    let mut context = global_context().lock().expect(ERR_POISONED_LOCK);

    if context.contains_key(key) {
        tracing::warn!(key, value, "failed to add custom context: the key already exists");
        return;
    }

    context.insert(key.to_string(), value.to_string());
}

fn global_context() -> &'static Mutex<BTreeMap<String, String>> {
    static GLOBAL_CONTEXT: Mutex<BTreeMap<String, String>> = Mutex::new(BTreeMap::new());
    &GLOBAL_CONTEXT
}

fn global_context_snapshot() -> BTreeMap<String, String> {
    global_context().lock().expect(ERR_POISONED_LOCK).clone()
}

static MEMORY_MANAGER: OnceLock<Arc<dyn MemoryManager>> = OnceLock::new();

/// Registers the process-wide memory manager whose measurements bracket the
/// first repetition of every instance.
///
/// Only the first registration takes effect; later calls are ignored with a
/// diagnostic.
pub fn register_memory_manager(manager: Arc<dyn MemoryManager>) {
    if MEMORY_MANAGER.set(manager).is_err() {
        tracing::warn!("a memory manager is already registered; ignoring");
    }
}

fn registered_memory_manager() -> Option<Arc<dyn MemoryManager>> {
    MEMORY_MANAGER.get().map(Arc::clone)
}

/// Runs every benchmark registered with the process-wide registry that
/// matches the configured filter, using the settings established by
/// [`initialize`].
///
/// `display_reporter` defaults to the configured display format writing to
/// standard output; `file_reporter` defaults to the configured file format
/// writing to the configured output file, when one is set. Returns the
/// number of matched instances.
#[cfg_attr(test, mutants::skip)] // Exercising process-global state and stdout is impractical here.
pub fn run_specified_benchmarks(
    display_reporter: Option<&mut dyn Reporter>,
    file_reporter: Option<&mut dyn Reporter>,
) -> Result<usize, DriverError> {
    let settings = config::global_settings();
    run_specified_benchmarks_with(
        global_families(),
        &settings,
        display_reporter,
        file_reporter,
    )
}

/// [`run_specified_benchmarks`] against an explicitly owned registry and
/// settings, for hosts that avoid process-wide state.
pub fn run_specified_benchmarks_with(
    families: &BenchmarkFamilies,
    settings: &Settings,
    display_reporter: Option<&mut dyn Reporter>,
    file_reporter: Option<&mut dyn Reporter>,
) -> Result<usize, DriverError> {
    let mut owned_display: Option<Box<dyn Reporter>> = None;
    let display: &mut dyn Reporter = match display_reporter {
        Some(reporter) => reporter,
        None => {
            let color = match settings.color {
                ColorMode::Always => true,
                ColorMode::Never => false,
                ColorMode::Auto => io::stdout().is_terminal(),
            };
            &mut **owned_display.insert(create_reporter(
                settings.format,
                Box::new(io::stdout()),
                color,
                settings.counters_tabular,
            ))
        }
    };

    if file_reporter.is_some() && settings.out.is_none() {
        return Err(DriverError::FileReporterRequiresOutputFile);
    }

    let mut owned_file: Option<Box<dyn Reporter>> = None;
    let file: Option<&mut dyn Reporter> = match (&settings.out, file_reporter) {
        (None, _) => None,
        (Some(path), file_reporter) => {
            let output_file =
                std::fs::File::create(path).map_err(|source| DriverError::InvalidOutputFile {
                    path: path.clone(),
                    source,
                })?;

            match file_reporter {
                // A custom file reporter writes to its own sink; the output
                // file is still required to exist by the configuration
                // contract.
                Some(reporter) => Some(reporter),
                None => Some(&mut **owned_file.insert(create_reporter(
                    settings.out_format,
                    Box::new(output_file),
                    false,
                    settings.counters_tabular,
                ))),
            }
        }
    };

    Ok(run_benchmarks(
        families,
        settings,
        display,
        file,
        &mut io::stdout(),
        &mut io::stderr(),
    ))
}

/// The reporting-agnostic core: expands and filters the registry, runs the
/// schedule, and routes results.
///
/// `out` receives the instance listing in `list_tests` mode and `err` the
/// driver diagnostics. Returns the number of matched instances; filter
/// errors and an empty match both report a diagnostic and return zero.
pub fn run_benchmarks(
    families: &BenchmarkFamilies,
    settings: &Settings,
    display_reporter: &mut dyn Reporter,
    file_reporter: Option<&mut dyn Reporter>,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> usize {
    let filter = match BenchmarkFilter::compile(&settings.filter) {
        Ok(filter) => filter,
        Err(error) => {
            let _ = writeln!(err, "{error}");
            return 0;
        }
    };

    let instances = families.find(&filter, err);
    if instances.is_empty() {
        let _ = writeln!(
            err,
            "Failed to match any benchmarks against regex: {}",
            settings.filter
        );
        return 0;
    }

    if settings.list_tests {
        for instance in &instances {
            let _ = writeln!(out, "{}", instance.name());
        }
        return instances.len();
    }

    run_matched(&instances, settings, display_reporter, file_reporter);
    instances.len()
}

/// Per-family accumulation feeding the complexity fit.
struct FamilyReports {
    family_name: String,
    num_runs_total: usize,
    num_runs_done: usize,
    runs: Vec<Run>,
}

fn run_matched(
    instances: &[BenchmarkInstance],
    settings: &Settings,
    display_reporter: &mut dyn Reporter,
    mut file_reporter: Option<&mut dyn Reporter>,
) {
    let context = build_context(instances, settings);

    let proceed = display_reporter.report_context(&context)
        && file_reporter
            .as_deref_mut()
            .is_none_or(|reporter| reporter.report_context(&context));

    if proceed {
        let platform = PlatformFacade::real();
        let perf_backend = perf::registered_backend();
        let memory_manager = registered_memory_manager();

        let mut per_family_reports: HashMap<usize, FamilyReports> = HashMap::new();
        let mut runners: Vec<BenchmarkRunner<'_>> = Vec::with_capacity(instances.len());

        for instance in instances {
            let perf_measurement =
                PerfCountersMeasurement::create(&settings.perf_counters, perf_backend.clone());

            let runner = BenchmarkRunner::new(
                instance,
                settings,
                platform.clone(),
                perf_measurement,
                memory_manager.clone(),
            );

            if instance.complexity().is_some() {
                let entry = per_family_reports
                    .entry(instance.family_index())
                    .or_insert_with(|| FamilyReports {
                        family_name: instance.family_name().to_string(),
                        num_runs_total: 0,
                        num_runs_done: 0,
                        runs: Vec::new(),
                    });
                entry.num_runs_total += runner.repeats();
            }

            runners.push(runner);
        }

        // One schedule token per repetition, in instance order; random
        // interleaving shuffles the same multiset.
        let mut repetition_indices: Vec<usize> = runners
            .iter()
            .enumerate()
            .flat_map(|(runner_index, runner)| {
                std::iter::repeat_n(runner_index, runner.repeats())
            })
            .collect();

        if settings.enable_random_interleaving {
            repetition_indices.shuffle(&mut rand::rng());
        }

        for runner_index in repetition_indices {
            let runner = &mut runners[runner_index];

            let completed = match runner.do_one_repetition() {
                Some(run) => run.clone(),
                // A token for a runner that errored out earlier.
                None => continue,
            };

            let instance = &instances[runner_index];

            if instance.complexity().is_some() {
                let entry = per_family_reports
                    .get_mut(&instance.family_index())
                    .expect("complexity families are registered before scheduling");
                entry.num_runs_done += 1;
                if !completed.error_occurred {
                    entry.runs.push(completed);
                }
            }

            if runner.has_repeats_remaining() {
                continue;
            }

            let mut results = runner.take_results();

            // The runner that exhausts a complexity family's schedule last
            // carries the fit rows.
            if instance.complexity().is_some() {
                let family_complete = per_family_reports
                    .get(&instance.family_index())
                    .is_some_and(|entry| entry.num_runs_done == entry.num_runs_total);

                if family_complete {
                    let entry = per_family_reports
                        .remove(&instance.family_index())
                        .expect("entry presence was just observed");
                    results
                        .aggregates_only
                        .extend(complexity::compute_big_o(&entry.family_name, &entry.runs));
                }
            }

            report(display_reporter, file_reporter.as_deref_mut(), &results);
        }
    }

    display_reporter.finalize();
    if let Some(reporter) = file_reporter {
        reporter.finalize();
    }
}

fn build_context(instances: &[BenchmarkInstance], settings: &Settings) -> Context {
    let mut might_have_aggregates = settings.repetitions.get() > 1;
    let mut name_field_width = 10;
    let mut stat_field_width = 0;

    for instance in instances {
        name_field_width = name_field_width.max(instance.name().len());
        might_have_aggregates |= instance.repetitions().is_some_and(|r| r.get() > 1);

        for statistic in instance.statistics() {
            stat_field_width = stat_field_width.max(statistic.name.len());
        }
    }

    if might_have_aggregates {
        name_field_width += 1 + stat_field_width;
    }

    Context {
        name_field_width,
        global_context: global_context_snapshot(),
    }
}

fn report<R: Reporter + ?Sized>(
    display_reporter: &mut dyn Reporter,
    file_reporter: Option<&mut R>,
    results: &RunResults,
) {
    fn report_one<R: Reporter + ?Sized>(
        reporter: &mut R,
        aggregates_only: bool,
        results: &RunResults,
    ) {
        // When there are no aggregates, per-repetition runs go out anyway.
        let aggregates_only = aggregates_only && !results.aggregates_only.is_empty();

        if !aggregates_only {
            reporter.report_runs(&results.non_aggregates);
        }
        if !results.aggregates_only.is_empty() {
            reporter.report_runs(&results.aggregates_only);
        }
    }

    report_one(display_reporter, results.display_report_aggregates_only, results);
    if let Some(reporter) = file_reporter {
        report_one(reporter, results.file_report_aggregates_only, results);
    }
}
