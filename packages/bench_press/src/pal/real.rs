//! Real platform implementation using system clocks.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use cpu_time::{ProcessTime, ThreadTime};

use crate::pal::abstractions::Platform;

/// The epoch all wall-clock readings are expressed against. Captured lazily
/// on first use; only differences between readings are meaningful.
static WALL_CLOCK_EPOCH: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Real implementation of the platform abstraction.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RealPlatform;

impl Platform for RealPlatform {
    fn real_time(&self) -> Duration {
        WALL_CLOCK_EPOCH.elapsed()
    }

    fn thread_time(&self) -> Duration {
        ThreadTime::now().as_duration()
    }

    fn process_time(&self) -> Duration {
        ProcessTime::now().as_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_time_is_monotonic() {
        let platform = RealPlatform;

        let first = platform.real_time();
        let second = platform.real_time();

        assert!(second >= first);
    }

    #[test]
    fn processor_times_are_monotonic() {
        let platform = RealPlatform;

        let thread_first = platform.thread_time();
        let process_first = platform.process_time();

        // Burn a little processor time so the readings have a chance to move.
        std::hint::black_box((0..10_000).sum::<u64>());

        assert!(platform.thread_time() >= thread_first);
        assert!(platform.process_time() >= process_first);
    }
}
