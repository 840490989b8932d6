//! Multi-threaded microbenchmark harness.
//!
//! This package measures the cost of registered benchmark bodies over a
//! calibrated number of iterations: it grows the iteration count until the
//! measurement is significant, repeats the measurement to estimate variance,
//! aggregates multi-threaded runs consistently, and optionally fits
//! empirical complexity curves across parametric benchmark families.
//!
//! The core functionality includes:
//! - [`Benchmark`] - A benchmark family definition with its argument tuples,
//!   thread counts, timing mode and statistics
//! - [`BenchmarkFamilies`] - The ordered registry families are added to and
//!   expanded from
//! - [`State`] - The per-thread iteration contract handed to benchmark bodies
//! - [`Run`] / [`RunResults`] - The measurement records handed to reporters
//! - [`Reporter`] - The reporting interface, with console, JSON and CSV
//!   built-ins
//!
//! This package is not meant for use in production, serving only as a
//! development tool for benchmarking and performance analysis.
//!
//! # Basic example
//!
//! ```
//! use bench_press::{Benchmark, BenchmarkFamilies, ConsoleReporter, Settings};
//! use new_zealand::nz;
//!
//! let families = BenchmarkFamilies::new();
//! families.add(
//!     Benchmark::new("sum_range", |state| {
//!         let n = state.range(0);
//!         while state.keep_running() {
//!             bench_press::do_not_optimize((0..n).sum::<i64>());
//!         }
//!     })
//!     .range(8, 512)
//!     // A fixed iteration count skips calibration; leave it unset to let
//!     // the harness pick one that satisfies the minimum measurement time.
//!     .iterations(nz!(100)),
//! );
//!
//! let mut sink: Vec<u8> = Vec::new();
//! let mut reporter = ConsoleReporter::with_options(Box::new(std::io::sink()), false, false);
//! let matched = bench_press::run_benchmarks(
//!     &families,
//!     &Settings::default(),
//!     &mut reporter,
//!     None,
//!     &mut sink,
//!     &mut std::io::sink(),
//! );
//! assert_eq!(matched, 3);
//! ```
//!
//! # Process-wide registration
//!
//! Hosts that register benchmarks at startup use the global registry and the
//! driver API instead: [`register_benchmark`], [`initialize`],
//! [`run_specified_benchmarks`], [`clear_registered_benchmarks`] and
//! [`shutdown`].

mod benchmark;
mod complexity;
mod config;
mod counter;
mod driver;
mod filter;
mod hints;
mod instance;
mod manager;
mod pal;
mod perf;
mod ranges;
mod registry;
mod reporter;
mod run;
mod runner;
mod state;
mod statistics;
mod timer;

pub use benchmark::{Benchmark, BenchmarkBody};
pub use complexity::BigO;
pub use config::{ColorMode, ConfigError, OutputFormat, Settings};
pub use counter::{Counter, CounterFlags, UserCounters};
pub use driver::{
    DriverError, add_custom_context, initialize, register_memory_manager, run_benchmarks,
    run_specified_benchmarks, run_specified_benchmarks_with, shutdown,
};
pub use filter::{BenchmarkFilter, FilterError};
pub use hints::{clobber_memory, do_not_optimize};
pub use instance::BenchmarkInstance;
pub use perf::{PerfCounterBackend, register_perf_counter_backend};
pub use ranges::{create_dense_range, create_range};
pub use registry::{BenchmarkFamilies, clear_registered_benchmarks, register_benchmark};
pub use reporter::{ConsoleReporter, Context, CsvReporter, JsonReporter, Reporter};
pub use run::{AggregationReportMode, MemoryManager, MemoryUsage, Run, RunResults, TimeUnit};
pub use state::{State, StateIter};
pub use statistics::{
    Statistic, StatisticFn, statistics_mean, statistics_median, statistics_stddev,
};

pub(crate) const ERR_POISONED_LOCK: &str =
    "encountered poisoned lock - program validity cannot be guaranteed";
