//! The per-thread object handed to benchmark bodies.

use std::num::NonZero;
use std::time::Duration;

use crate::counter::UserCounters;
use crate::manager::ThreadManager;
use crate::perf::PerfCountersMeasurement;
use crate::timer::ThreadTimer;

/// The iteration contract between the harness and a benchmark body.
///
/// A fresh `State` is constructed per repetition, per worker thread. The body
/// drives it either with a `while` loop:
///
/// ```ignore
/// while state.keep_running() {
///     // measured work
/// }
/// ```
///
/// or with the iterator form:
///
/// ```ignore
/// for _ in &mut *state {
///     // measured work
/// }
/// ```
///
/// Both yield exactly the calibrated number of iterations unless an error is
/// signalled via [`skip_with_error`](Self::skip_with_error), and must run to
/// completion with no intervening return. The first iteration check gates on
/// the instance's start barrier and starts this thread's timer; the final
/// check stops the timer and gates on the stop barrier.
#[repr(C)]
pub struct State<'a> {
    // The two fields the hot iteration check touches sit at the front so
    // they share the first cache line.
    total_iterations: u64,
    error_occurred: bool,

    started: bool,
    finished: bool,
    max_iterations: u64,
    thread_index: usize,
    threads: NonZero<usize>,

    /// User counters to attach to this repetition's measurements.
    pub counters: UserCounters,

    args: &'a [i64],
    timer: &'a mut ThreadTimer,
    manager: &'a ThreadManager,
    perf: Option<&'a PerfCountersMeasurement>,
}

// The hot fields must stay within the first cache line.
const _: () = assert!(
    std::mem::offset_of!(State<'static>, error_occurred) + std::mem::size_of::<bool>() <= 64
);

impl<'a> State<'a> {
    pub(crate) fn new(
        max_iterations: u64,
        args: &'a [i64],
        thread_index: usize,
        threads: NonZero<usize>,
        timer: &'a mut ThreadTimer,
        manager: &'a ThreadManager,
        perf: Option<&'a PerfCountersMeasurement>,
    ) -> Self {
        assert!(max_iterations >= 1, "at least one iteration must be run");
        assert!(
            thread_index < threads.get(),
            "thread_index must be less than threads"
        );

        Self {
            total_iterations: 0,
            error_occurred: false,
            started: false,
            finished: false,
            max_iterations,
            thread_index,
            threads,
            counters: UserCounters::new(),
            args,
            timer,
            manager,
            perf,
        }
    }

    /// Returns `true` exactly `max_iterations` times, then `false` forever.
    ///
    /// The first call joins the start barrier and begins timing; the call
    /// that exhausts the countdown stops timing and joins the stop barrier.
    /// After [`skip_with_error`](Self::skip_with_error) the next call
    /// returns `false`.
    #[inline]
    pub fn keep_running(&mut self) -> bool {
        if self.total_iterations > 0 {
            self.total_iterations -= 1;
            return true;
        }

        if !self.started {
            self.start_keep_running();
            if !self.error_occurred && self.total_iterations > 0 {
                self.total_iterations -= 1;
                return true;
            }
        }

        if !self.finished {
            self.finish_keep_running();
        }

        false
    }

    /// Stops timing (and perf collection) until
    /// [`resume_timing`](Self::resume_timing).
    ///
    /// # Panics
    ///
    /// Panics unless called from within the iteration loop of a benchmark
    /// that has not signalled an error.
    pub fn pause_timing(&mut self) {
        assert!(
            self.started && !self.finished && !self.error_occurred,
            "pause_timing called outside the running iteration loop"
        );

        self.stop_measurement();
    }

    /// Resumes timing after a [`pause_timing`](Self::pause_timing).
    ///
    /// # Panics
    ///
    /// Panics unless called from within the iteration loop of a benchmark
    /// that has not signalled an error.
    pub fn resume_timing(&mut self) {
        assert!(
            self.started && !self.finished && !self.error_occurred,
            "resume_timing called outside the running iteration loop"
        );

        self.start_measurement();
    }

    /// Reports an error from the benchmark body and ends the iteration loop.
    ///
    /// The next iteration check returns `false`; the first reported message
    /// per instance is the one that survives into the run record. The
    /// repetition itself terminates cleanly.
    pub fn skip_with_error(&mut self, message: &str) {
        self.error_occurred = true;
        self.manager.lock_results().record_error(message);
        self.total_iterations = 0;
        if self.timer.running() {
            self.timer.stop();
        }
    }

    /// Records manually measured time for the current iteration.
    ///
    /// Only meaningful for families that elected manual timing.
    pub fn set_iteration_time(&mut self, elapsed: Duration) {
        self.timer.set_iteration_time(elapsed);
    }

    /// Attaches a label to this instance's report.
    pub fn set_label(&mut self, label: &str) {
        self.manager.lock_results().report_label = label.to_string();
    }

    /// The `index`-th element of the instance's argument tuple.
    ///
    /// # Panics
    ///
    /// Panics when the instance has no argument at `index`.
    #[must_use]
    pub fn range(&self, index: usize) -> i64 {
        self.args[index]
    }

    /// Iterations completed so far; equals
    /// [`max_iterations`](Self::max_iterations) once the loop has ended.
    #[must_use]
    pub fn iterations(&self) -> u64 {
        if !self.started {
            return 0;
        }
        self.max_iterations - self.total_iterations
    }

    /// The calibrated iteration count of this repetition.
    #[must_use]
    pub fn max_iterations(&self) -> u64 {
        self.max_iterations
    }

    /// The index of this worker thread, `0..threads`.
    #[must_use]
    pub fn thread_index(&self) -> usize {
        self.thread_index
    }

    /// How many worker threads execute this instance.
    #[must_use]
    pub fn threads(&self) -> NonZero<usize> {
        self.threads
    }

    /// Whether [`skip_with_error`](Self::skip_with_error) was called.
    #[must_use]
    pub fn error_occurred(&self) -> bool {
        self.error_occurred
    }

    fn start_keep_running(&mut self) {
        assert!(
            !self.started && !self.finished,
            "the iteration loop was started twice"
        );

        self.started = true;
        self.total_iterations = if self.error_occurred {
            0
        } else {
            self.max_iterations
        };

        self.manager.start_barrier();

        if !self.error_occurred {
            self.start_measurement();
        }
    }

    fn finish_keep_running(&mut self) {
        assert!(
            self.started && (!self.finished || self.error_occurred),
            "the iteration loop finished without being started"
        );

        if !self.error_occurred {
            self.stop_measurement();
        }

        self.total_iterations = 0;
        self.finished = true;

        self.manager.stop_barrier();
    }

    fn start_measurement(&mut self) {
        self.timer.start();
        if let Some(perf) = self.perf {
            perf.start();
        }
    }

    fn stop_measurement(&mut self) {
        self.timer.stop();
        if let Some(perf) = self.perf {
            perf.stop_and_record(&mut self.counters);
        }
    }
}

impl std::fmt::Debug for State<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("total_iterations", &self.total_iterations)
            .field("max_iterations", &self.max_iterations)
            .field("error_occurred", &self.error_occurred)
            .field("thread_index", &self.thread_index)
            .field("threads", &self.threads)
            .finish_non_exhaustive()
    }
}

/// The iterator form of the iteration contract; see [`State`].
#[derive(Debug)]
pub struct StateIter<'a, 'b> {
    state: &'b mut State<'a>,
}

impl Iterator for StateIter<'_, '_> {
    type Item = ();

    #[inline]
    fn next(&mut self) -> Option<()> {
        if self.state.keep_running() { Some(()) } else { None }
    }
}

impl<'a, 'b> IntoIterator for &'b mut State<'a> {
    type Item = ();
    type IntoIter = StateIter<'a, 'b>;

    fn into_iter(self) -> Self::IntoIter {
        StateIter { state: self }
    }
}
