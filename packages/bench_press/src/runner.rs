//! Per-instance execution: calibration, repetitions and finalization.

use std::sync::Arc;
use std::thread;

use crate::config::Settings;
use crate::counter;
use crate::instance::BenchmarkInstance;
use crate::manager::{ResultsAccumulator, ThreadManager};
use crate::pal::PlatformFacade;
use crate::perf::PerfCountersMeasurement;
use crate::run::{AggregationReportMode, MemoryManager, MemoryUsage, Run, RunResults};
use crate::state::State;
use crate::statistics;
use crate::timer::{CpuClock, ThreadTimer};

/// The outcome of running the body for a trial iteration count across all
/// worker threads.
#[derive(Debug)]
struct IterationResults {
    results: ResultsAccumulator,
    iters: u64,
    /// The mode-selected measurement time calibration compares against
    /// `min_time`: manual, wall-clock or processor time, in seconds.
    seconds: f64,
}

/// Drives one benchmark instance through calibration and its repetitions.
///
/// The driver dispatches [`do_one_repetition`](Self::do_one_repetition) once
/// per schedule token and collects [`take_results`](Self::take_results) when
/// no repeats remain. An error during calibration or any repetition
/// short-circuits the instance's remaining repetitions; later tokens for the
/// same runner become no-ops.
pub(crate) struct BenchmarkRunner<'a> {
    instance: &'a BenchmarkInstance,
    platform: PlatformFacade,

    min_time: f64,
    repeats: usize,
    has_explicit_iteration_count: bool,
    max_iterations_cap: u64,

    /// The current trial iteration count; after calibration, the converged
    /// count reused by every repetition.
    iters: u64,

    perf: Option<PerfCountersMeasurement>,
    memory_manager: Option<Arc<dyn MemoryManager>>,

    num_repetitions_done: usize,
    errored: bool,
    run_results: RunResults,
}

impl<'a> BenchmarkRunner<'a> {
    pub(crate) fn new(
        instance: &'a BenchmarkInstance,
        settings: &Settings,
        platform: PlatformFacade,
        perf: Option<PerfCountersMeasurement>,
        memory_manager: Option<Arc<dyn MemoryManager>>,
    ) -> Self {
        let min_time = if instance.min_time() > 0.0 {
            instance.min_time()
        } else {
            settings.min_time
        };

        let repeats = instance
            .repetitions()
            .map_or(settings.repetitions.get(), |repetitions| repetitions.get());

        let mut display_report_aggregates_only =
            settings.report_aggregates_only || settings.display_aggregates_only;
        let mut file_report_aggregates_only = settings.report_aggregates_only;

        let mode = instance.aggregation_report_mode();
        if !mode.is_unspecified() {
            display_report_aggregates_only =
                mode.contains(AggregationReportMode::DISPLAY_REPORT_AGGREGATES_ONLY);
            file_report_aggregates_only =
                mode.contains(AggregationReportMode::FILE_REPORT_AGGREGATES_ONLY);
        }

        Self {
            instance,
            platform,
            min_time,
            repeats,
            has_explicit_iteration_count: instance.iterations().is_some(),
            max_iterations_cap: settings.max_iterations,
            iters: instance.iterations().map_or(1, |iterations| iterations.get()),
            perf,
            memory_manager,
            num_repetitions_done: 0,
            errored: false,
            run_results: RunResults {
                display_report_aggregates_only,
                file_report_aggregates_only,
                ..RunResults::default()
            },
        }
    }

    pub(crate) fn repeats(&self) -> usize {
        self.repeats
    }

    pub(crate) fn has_repeats_remaining(&self) -> bool {
        !self.errored && self.num_repetitions_done < self.repeats
    }

    /// Runs one repetition, returning its completed [`Run`], or `None` for a
    /// token dispatched after the instance finished (or errored out).
    pub(crate) fn do_one_repetition(&mut self) -> Option<&Run> {
        if !self.has_repeats_remaining() {
            return None;
        }

        let is_first = self.num_repetitions_done == 0;

        let results = if is_first && !self.has_explicit_iteration_count {
            self.calibrate_iteration_count()
        } else {
            self.do_n_iterations(self.iters)
        };

        let memory_usage = if is_first && !results.results.has_error() {
            self.measure_memory_usage()
        } else {
            None
        };

        let run = self.create_run_report(&results, memory_usage);
        if run.error_occurred {
            self.errored = true;
        }

        self.run_results.non_aggregates.push(run);
        self.num_repetitions_done += 1;

        if !self.has_repeats_remaining() && self.repeats > 1 {
            let aggregates = statistics::compute_aggregates(
                &self.run_results.non_aggregates,
                self.instance.statistics(),
            );
            self.run_results.aggregates_only.extend(aggregates);
        }

        self.run_results.non_aggregates.last()
    }

    /// Hands the accumulated results out; called exactly once, after the
    /// final repetition.
    pub(crate) fn take_results(&mut self) -> RunResults {
        assert!(
            !self.has_repeats_remaining(),
            "results were requested while repetitions remain"
        );

        std::mem::take(&mut self.run_results)
    }

    /// Grows the trial iteration count until the measured time is
    /// significant, keeping the converged count for all repetitions.
    fn calibrate_iteration_count(&mut self) -> IterationResults {
        loop {
            let trial = self.do_n_iterations(self.iters);

            if trial.results.has_error() || self.is_significant(&trial) {
                return trial;
            }

            let next = self.predict_next_iters(&trial);
            tracing::debug!(
                benchmark = self.instance.name(),
                trial_iters = trial.iters,
                trial_seconds = trial.seconds,
                next_iters = next,
                "measurement below the minimum time, growing the iteration count"
            );
            self.iters = next;
        }
    }

    /// A trial is accepted once its measured time reaches `min_time`, the
    /// iteration cap is hit, or accumulated wall-clock time has overshot
    /// `min_time` five-fold (a runaway guard for processor-starved bodies).
    fn is_significant(&self, trial: &IterationResults) -> bool {
        trial.iters >= self.max_iterations_cap
            || trial.seconds >= self.min_time
            || trial.results.real_time_used.as_secs_f64() >= 5.0 * self.min_time
    }

    /// The next trial count:
    /// `min(max(min_time / time_per_iter * 1.4, last * 10), cap)`, falling
    /// back to a ten-fold step when the trial time was unmeasurably small.
    fn predict_next_iters(&self, trial: &IterationResults) -> u64 {
        let last = trial.iters as f64;

        let predicted = if trial.seconds <= 0.0 {
            last * 10.0
        } else {
            let time_per_iter = trial.seconds / last;
            (self.min_time / time_per_iter * 1.4).max(last * 10.0)
        };

        (predicted.min(self.max_iterations_cap as f64)).round() as u64
    }

    /// Executes the body for `iters` iterations on every worker thread of
    /// the instance and gathers the adjusted measurements.
    fn do_n_iterations(&self, iters: u64) -> IterationResults {
        let threads = self.instance.threads().get();
        let manager = ThreadManager::new(threads);

        thread::scope(|scope| {
            for thread_index in 1..threads {
                let manager = &manager;
                let instance = self.instance;
                let perf = self.perf.as_ref();
                let platform = &self.platform;

                scope.spawn(move || {
                    run_in_thread(instance, iters, thread_index, manager, perf, platform);
                });
            }

            // The driving thread participates as worker zero.
            run_in_thread(
                self.instance,
                iters,
                0,
                &manager,
                self.perf.as_ref(),
                &self.platform,
            );

            manager.wait_for_all_threads();
        });

        let mut results = manager.into_results();

        // Wall-clock and manual time were accumulated once per thread; the
        // instance-level value is the per-thread average. Processor time
        // stays summed, except in process-CPU mode where every thread
        // measured the whole process.
        results.real_time_used /= threads as u32;
        results.manual_time_used /= threads as u32;
        if self.instance.measure_process_cpu_time() {
            results.cpu_time_used /= threads as u32;
        }

        let seconds = if self.instance.use_manual_time() {
            results.manual_time_used
        } else if self.instance.use_real_time() {
            results.real_time_used
        } else {
            results.cpu_time_used
        }
        .as_secs_f64();

        IterationResults {
            results,
            iters,
            seconds,
        }
    }

    /// Brackets one additional single-iteration pass with the registered
    /// memory manager to observe allocator behavior.
    fn measure_memory_usage(&self) -> Option<MemoryUsage> {
        let memory_manager = self.memory_manager.as_ref()?;

        memory_manager.start();
        let _ = self.do_n_iterations(1);
        Some(memory_manager.stop())
    }

    fn create_run_report(
        &self,
        trial: &IterationResults,
        memory_usage: Option<MemoryUsage>,
    ) -> Run {
        let instance = self.instance;

        let mut run = Run::new(
            instance.name().to_string(),
            instance.family_index(),
            instance.per_family_instance_index(),
        );
        run.threads = instance.threads().get();
        run.time_unit = instance.time_unit();
        run.report_label = trial.results.report_label.clone();
        run.complexity = instance.complexity();
        run.complexity_n = instance.complexity_n();

        if let Some(message) = &trial.results.error_message {
            run.error_occurred = true;
            run.error_message = message.clone();
            return run;
        }

        run.iterations = trial.iters;

        let real = trial.results.real_time_used.as_secs_f64();
        let manual = trial.results.manual_time_used.as_secs_f64();
        run.real_accumulated_time = if instance.use_manual_time() { manual } else { real };
        run.cpu_accumulated_time = trial.results.cpu_time_used.as_secs_f64();
        run.manual_accumulated_time = manual;

        run.counters = trial.results.counters.clone();
        counter::finish_all(
            &mut run.counters,
            trial.results.iterations,
            trial.seconds,
            run.threads,
        );

        run.memory_usage = memory_usage;
        run
    }
}

fn run_in_thread(
    instance: &BenchmarkInstance,
    iters: u64,
    thread_index: usize,
    manager: &ThreadManager,
    perf: Option<&PerfCountersMeasurement>,
    platform: &PlatformFacade,
) {
    let cpu_clock = if instance.measure_process_cpu_time() {
        CpuClock::Process
    } else {
        CpuClock::Thread
    };
    let mut timer = ThreadTimer::new(platform.clone(), cpu_clock);

    let (iterations, counters) = {
        let mut state = State::new(
            iters,
            instance.args(),
            thread_index,
            instance.threads(),
            &mut timer,
            manager,
            perf,
        );

        (instance.body())(&mut state);

        assert!(
            state.error_occurred() || state.iterations() == state.max_iterations(),
            "the benchmark body returned before the iteration loop finished"
        );

        (state.iterations(), std::mem::take(&mut state.counters))
    };

    manager.record_thread_results(
        iterations,
        timer.real_time_used(),
        timer.cpu_time_used(),
        timer.manual_time_used(),
        &counters,
    );
    manager.notify_thread_complete();
}
