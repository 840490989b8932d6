//! Shared state among the worker threads of one benchmark instance.

use std::sync::{Barrier, Condvar, Mutex};
use std::time::Duration;

use crate::ERR_POISONED_LOCK;
use crate::counter::{self, UserCounters};

/// The shared measurement accumulator every worker thread contributes to
/// after passing the stop barrier.
///
/// Times and iteration counts sum across workers; the error message and
/// report label follow first-writer-wins semantics.
#[derive(Debug, Default)]
pub(crate) struct ResultsAccumulator {
    pub(crate) iterations: u64,
    pub(crate) real_time_used: Duration,
    pub(crate) cpu_time_used: Duration,
    pub(crate) manual_time_used: Duration,
    pub(crate) report_label: String,
    pub(crate) error_message: Option<String>,
    pub(crate) counters: UserCounters,
}

impl ResultsAccumulator {
    pub(crate) fn has_error(&self) -> bool {
        self.error_message.is_some()
    }

    /// Records the error message unless one was already recorded.
    pub(crate) fn record_error(&mut self, message: &str) {
        if self.error_message.is_none() {
            self.error_message = Some(message.to_string());
        }
    }
}

/// Coordinates the worker threads of a single repetition.
///
/// Every worker calls [`start_barrier`](Self::start_barrier) before its timed
/// iteration begins and [`stop_barrier`](Self::stop_barrier) immediately
/// after; the two barriers are single-use and a fresh manager is allocated
/// per repetition. Results recording happens under the mutex returned by
/// [`lock_results`](Self::lock_results), and the driving thread uses
/// [`wait_for_all_threads`](Self::wait_for_all_threads) to observe that
/// every contribution has landed before finalizing the run.
#[derive(Debug)]
pub(crate) struct ThreadManager {
    start_barrier: Barrier,
    stop_barrier: Barrier,
    results: Mutex<ResultsAccumulator>,
    alive_threads: Mutex<usize>,
    all_threads_done: Condvar,
}

impl ThreadManager {
    pub(crate) fn new(num_threads: usize) -> Self {
        Self {
            start_barrier: Barrier::new(num_threads),
            stop_barrier: Barrier::new(num_threads),
            results: Mutex::new(ResultsAccumulator::default()),
            alive_threads: Mutex::new(num_threads),
            all_threads_done: Condvar::new(),
        }
    }

    /// Blocks until every worker has arrived at the pre-iteration barrier.
    pub(crate) fn start_barrier(&self) {
        self.start_barrier.wait();
    }

    /// Blocks until every worker has arrived at the post-iteration barrier.
    pub(crate) fn stop_barrier(&self) {
        self.stop_barrier.wait();
    }

    pub(crate) fn lock_results(&self) -> std::sync::MutexGuard<'_, ResultsAccumulator> {
        self.results.lock().expect(ERR_POISONED_LOCK)
    }

    /// Contributes one worker's timing accumulators and counters into the
    /// shared results, all under a single lock acquisition.
    pub(crate) fn record_thread_results(
        &self,
        iterations: u64,
        real_time_used: Duration,
        cpu_time_used: Duration,
        manual_time_used: Duration,
        counters: &UserCounters,
    ) {
        let mut results = self.lock_results();

        results.iterations += iterations;
        results.real_time_used += real_time_used;
        results.cpu_time_used += cpu_time_used;
        results.manual_time_used += manual_time_used;
        counter::increment(&mut results.counters, counters);
    }

    /// Marks the calling worker as finished, waking the driving thread when
    /// it was the last one.
    pub(crate) fn notify_thread_complete(&self) {
        let mut alive = self.alive_threads.lock().expect(ERR_POISONED_LOCK);

        *alive = alive
            .checked_sub(1)
            .expect("more thread completions than threads were started");

        if *alive == 0 {
            self.all_threads_done.notify_all();
        }
    }

    /// Blocks until every worker has called
    /// [`notify_thread_complete`](Self::notify_thread_complete).
    pub(crate) fn wait_for_all_threads(&self) {
        let mut alive = self.alive_threads.lock().expect(ERR_POISONED_LOCK);

        while *alive > 0 {
            alive = self.all_threads_done.wait(alive).expect(ERR_POISONED_LOCK);
        }
    }

    /// Consumes the manager, returning the accumulated results.
    pub(crate) fn into_results(self) -> ResultsAccumulator {
        self.results.into_inner().expect(ERR_POISONED_LOCK)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;
    use crate::counter::Counter;

    #[test]
    fn contributions_sum_across_threads() {
        let manager = Arc::new(ThreadManager::new(4));

        thread::scope(|s| {
            for _ in 0..4 {
                let manager = Arc::clone(&manager);
                s.spawn(move || {
                    manager.start_barrier();
                    manager.stop_barrier();

                    let mut counters = UserCounters::new();
                    counters.insert("items".to_string(), Counter::from(2.0));

                    manager.record_thread_results(
                        10,
                        Duration::from_millis(5),
                        Duration::from_millis(3),
                        Duration::ZERO,
                        &counters,
                    );
                    manager.notify_thread_complete();
                });
            }

            manager.wait_for_all_threads();
        });

        let results = Arc::into_inner(manager)
            .expect("all workers exited, no other handles remain")
            .into_results();

        assert_eq!(results.iterations, 40);
        assert_eq!(results.real_time_used, Duration::from_millis(20));
        assert_eq!(results.cpu_time_used, Duration::from_millis(12));
        assert_eq!(results.counters["items"].value, 8.0);
    }

    #[test]
    fn no_worker_passes_start_barrier_until_all_arrive() {
        let manager = Arc::new(ThreadManager::new(3));
        let arrived = Arc::new(AtomicUsize::new(0));
        let past_barrier = Arc::new(AtomicUsize::new(0));

        thread::scope(|s| {
            for _ in 0..3 {
                let manager = Arc::clone(&manager);
                let arrived = Arc::clone(&arrived);
                let past_barrier = Arc::clone(&past_barrier);

                s.spawn(move || {
                    arrived.fetch_add(1, Ordering::SeqCst);
                    manager.start_barrier();

                    // Once released, all three must have arrived.
                    assert_eq!(arrived.load(Ordering::SeqCst), 3);
                    past_barrier.fetch_add(1, Ordering::SeqCst);

                    manager.stop_barrier();
                    manager.notify_thread_complete();
                });
            }

            manager.wait_for_all_threads();
        });

        assert_eq!(past_barrier.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn first_error_message_wins() {
        let manager = ThreadManager::new(1);

        manager.lock_results().record_error("first failure");
        manager.lock_results().record_error("second failure");

        let results = manager.into_results();
        assert_eq!(results.error_message.as_deref(), Some("first failure"));
        assert!(results.has_error());
    }

    // The type coordinates threads, so it must be shareable between them.
    static_assertions::assert_impl_all!(ThreadManager: Send, Sync);
}
