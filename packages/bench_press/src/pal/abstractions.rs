//! Platform abstraction trait definitions.

use std::fmt::Debug;
use std::time::Duration;

/// Provides the clock readings the harness timers are built on.
///
/// This trait abstracts the underlying platform-specific clocks, allowing for
/// both real implementations (using system calls) and fake implementations
/// (for testing). All readings are durations since an arbitrary per-process
/// epoch; only differences between readings are meaningful.
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// Gets the current monotonic wall-clock reading.
    fn real_time(&self) -> Duration;

    /// Gets the current thread processor time.
    fn thread_time(&self) -> Duration;

    /// Gets the current process processor time.
    fn process_time(&self) -> Duration;
}
