//! Per-thread measurement accumulators.

use std::time::Duration;

use crate::pal::{Platform, PlatformFacade};

/// Which processor-time clock a timer reads.
///
/// Families that elect process-wide processor time measurement substitute the
/// process clock for the per-thread clock.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum CpuClock {
    Thread,
    Process,
}

/// Accumulates the measured time of one worker thread across the timed
/// portion of a repetition.
///
/// The timer maintains three independent accumulators: wall-clock time,
/// processor time and manually reported time. [`start`](Self::start) and
/// [`stop`](Self::stop) bracket measured sections and must alternate;
/// [`set_iteration_time`](Self::set_iteration_time) feeds the manual
/// accumulator regardless of whether the timer is running.
#[derive(Debug)]
pub(crate) struct ThreadTimer {
    platform: PlatformFacade,
    cpu_clock: CpuClock,

    running: bool,
    start_real_time: Duration,
    start_cpu_time: Duration,

    real_time_used: Duration,
    cpu_time_used: Duration,
    manual_time_used: Duration,
}

impl ThreadTimer {
    pub(crate) fn new(platform: PlatformFacade, cpu_clock: CpuClock) -> Self {
        Self {
            platform,
            cpu_clock,
            running: false,
            start_real_time: Duration::ZERO,
            start_cpu_time: Duration::ZERO,
            real_time_used: Duration::ZERO,
            cpu_time_used: Duration::ZERO,
            manual_time_used: Duration::ZERO,
        }
    }

    /// Begins a measured section.
    ///
    /// # Panics
    ///
    /// Panics if the timer is already running.
    pub(crate) fn start(&mut self) {
        assert!(!self.running, "timer started while already running");

        self.running = true;
        self.start_real_time = self.platform.real_time();
        self.start_cpu_time = self.read_cpu_time();
    }

    /// Ends a measured section, folding the elapsed wall-clock and processor
    /// time into the accumulators.
    ///
    /// # Panics
    ///
    /// Panics if the timer is not running.
    pub(crate) fn stop(&mut self) {
        assert!(self.running, "timer stopped while not running");

        self.running = false;
        self.real_time_used += self
            .platform
            .real_time()
            .saturating_sub(self.start_real_time);
        self.cpu_time_used += self.read_cpu_time().saturating_sub(self.start_cpu_time);
    }

    /// Adds manually measured time, independent of the running state.
    pub(crate) fn set_iteration_time(&mut self, elapsed: Duration) {
        self.manual_time_used += elapsed;
    }

    pub(crate) fn running(&self) -> bool {
        self.running
    }

    pub(crate) fn real_time_used(&self) -> Duration {
        self.real_time_used
    }

    pub(crate) fn cpu_time_used(&self) -> Duration {
        self.cpu_time_used
    }

    pub(crate) fn manual_time_used(&self) -> Duration {
        self.manual_time_used
    }

    fn read_cpu_time(&self) -> Duration {
        match self.cpu_clock {
            CpuClock::Thread => self.platform.thread_time(),
            CpuClock::Process => self.platform.process_time(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pal::FakePlatform;

    fn fake_timer(cpu_clock: CpuClock) -> (FakePlatform, ThreadTimer) {
        let fake = FakePlatform::new();
        let timer = ThreadTimer::new(PlatformFacade::fake(fake.clone()), cpu_clock);
        (fake, timer)
    }

    #[test]
    fn accumulates_only_while_running() {
        let (fake, mut timer) = fake_timer(CpuClock::Thread);

        fake.advance(Duration::from_millis(5));

        timer.start();
        fake.advance(Duration::from_millis(10));
        timer.stop();

        // Time passing outside a measured section is not accumulated.
        fake.advance(Duration::from_millis(100));

        timer.start();
        fake.advance(Duration::from_millis(20));
        timer.stop();

        assert_eq!(timer.real_time_used(), Duration::from_millis(30));
        assert_eq!(timer.cpu_time_used(), Duration::from_millis(30));
    }

    #[test]
    fn process_clock_substitutes_for_thread_clock() {
        let (fake, mut timer) = fake_timer(CpuClock::Process);

        timer.start();
        fake.set_thread_time(Duration::from_millis(1));
        fake.set_process_time(Duration::from_millis(8));
        timer.stop();

        assert_eq!(timer.cpu_time_used(), Duration::from_millis(8));
    }

    #[test]
    fn manual_time_accumulates_while_stopped() {
        let (_fake, mut timer) = fake_timer(CpuClock::Thread);

        timer.set_iteration_time(Duration::from_millis(3));
        timer.set_iteration_time(Duration::from_millis(4));

        assert_eq!(timer.manual_time_used(), Duration::from_millis(7));
    }

    #[test]
    #[should_panic(expected = "already running")]
    fn double_start_panics() {
        let (_fake, mut timer) = fake_timer(CpuClock::Thread);

        timer.start();
        timer.start();
    }

    #[test]
    #[should_panic(expected = "not running")]
    fn stop_without_start_panics() {
        let (_fake, mut timer) = fake_timer(CpuClock::Thread);

        timer.stop();
    }
}
