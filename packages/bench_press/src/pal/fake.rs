//! Fake platform implementation for testing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::pal::abstractions::Platform;

/// Internal state for the fake platform that can be shared between clones.
#[derive(Debug)]
struct FakePlatformState {
    real_time: Duration,
    thread_time: Duration,
    process_time: Duration,
}

/// Fake implementation of the platform abstraction for testing.
///
/// This implementation allows tests to control the clock readings instead of
/// relying on actual system calls. Multiple clones of the same `FakePlatform`
/// share the same underlying state, allowing tests to modify the readings
/// after platform creation to simulate time progression.
#[derive(Clone, Debug)]
pub(crate) struct FakePlatform {
    state: Arc<Mutex<FakePlatformState>>,
}

impl FakePlatform {
    /// Creates a new fake platform with zero clock readings.
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakePlatformState {
                real_time: Duration::ZERO,
                thread_time: Duration::ZERO,
                process_time: Duration::ZERO,
            })),
        }
    }

    /// Sets the wall-clock reading.
    pub(crate) fn set_real_time(&self, time: Duration) {
        self.state
            .lock()
            .expect("FakePlatform state lock should not be poisoned")
            .real_time = time;
    }

    /// Sets the thread processor time reading.
    pub(crate) fn set_thread_time(&self, time: Duration) {
        self.state
            .lock()
            .expect("FakePlatform state lock should not be poisoned")
            .thread_time = time;
    }

    /// Sets the process processor time reading.
    pub(crate) fn set_process_time(&self, time: Duration) {
        self.state
            .lock()
            .expect("FakePlatform state lock should not be poisoned")
            .process_time = time;
    }

    /// Advances every clock by the same amount, simulating a fully busy
    /// thread making wall-clock progress.
    pub(crate) fn advance(&self, by: Duration) {
        let mut state = self
            .state
            .lock()
            .expect("FakePlatform state lock should not be poisoned");

        state.real_time += by;
        state.thread_time += by;
        state.process_time += by;
    }
}

impl Platform for FakePlatform {
    fn real_time(&self) -> Duration {
        self.state
            .lock()
            .expect("FakePlatform state lock should not be poisoned")
            .real_time
    }

    fn thread_time(&self) -> Duration {
        self.state
            .lock()
            .expect("FakePlatform state lock should not be poisoned")
            .thread_time
    }

    fn process_time(&self) -> Duration {
        self.state
            .lock()
            .expect("FakePlatform state lock should not be poisoned")
            .process_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializes_with_zero_readings() {
        let platform = FakePlatform::new();

        assert_eq!(platform.real_time(), Duration::ZERO);
        assert_eq!(platform.thread_time(), Duration::ZERO);
        assert_eq!(platform.process_time(), Duration::ZERO);
    }

    #[test]
    fn shared_state_between_clones() {
        let platform1 = FakePlatform::new();
        let platform2 = platform1.clone();

        platform1.set_thread_time(Duration::from_millis(100));
        assert_eq!(platform2.thread_time(), Duration::from_millis(100));

        platform2.set_process_time(Duration::from_millis(200));
        assert_eq!(platform1.process_time(), Duration::from_millis(200));
    }

    #[test]
    fn advance_moves_every_clock() {
        let platform = FakePlatform::new();
        platform.set_real_time(Duration::from_millis(5));

        platform.advance(Duration::from_millis(10));

        assert_eq!(platform.real_time(), Duration::from_millis(15));
        assert_eq!(platform.thread_time(), Duration::from_millis(10));
        assert_eq!(platform.process_time(), Duration::from_millis(10));
    }
}
