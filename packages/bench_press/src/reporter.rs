//! The reporting interface consumed by the driver, and its built-ins.

mod console;
mod csv;
mod json;

use std::collections::BTreeMap;

pub use console::ConsoleReporter;
pub use csv::CsvReporter;
pub use json::JsonReporter;

use crate::config::OutputFormat;
use crate::run::Run;

/// Execution-wide information reported once, before any runs.
#[derive(Clone, Debug, Default)]
pub struct Context {
    /// Width the console reporter pads benchmark names to.
    pub name_field_width: usize,

    /// The process-wide key/value context established by the driver.
    pub global_context: BTreeMap<String, String>,
}

/// Consumes measurement results on behalf of an output channel.
///
/// The driver calls [`report_context`](Self::report_context) once up front
/// (returning `false` vetoes the execution), then
/// [`report_runs`](Self::report_runs) with each instance's runs as they
/// complete, and [`finalize`](Self::finalize) once at the end.
pub trait Reporter {
    fn report_context(&mut self, context: &Context) -> bool;

    fn report_runs(&mut self, runs: &[Run]);

    fn finalize(&mut self) {}
}

/// Builds the built-in reporter for a format, writing to `out`.
///
/// `color` and `counters_tabular` only affect the console format.
pub(crate) fn create_reporter(
    format: OutputFormat,
    out: Box<dyn std::io::Write>,
    color: bool,
    counters_tabular: bool,
) -> Box<dyn Reporter> {
    match format {
        OutputFormat::Console => {
            Box::new(ConsoleReporter::with_options(out, color, counters_tabular))
        }
        OutputFormat::Json => Box::new(JsonReporter::new(out)),
        OutputFormat::Csv => Box::new(CsvReporter::new(out)),
    }
}
