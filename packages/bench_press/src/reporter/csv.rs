//! Spreadsheet-oriented CSV output.

use std::io::Write;

use crate::reporter::{Context, Reporter};
use crate::run::Run;

/// Writes runs as CSV rows with a fixed column set.
///
/// User counter columns are discovered from the first reported batch; runs
/// reported later with additional counters keep the established columns.
pub struct CsvReporter {
    out: Box<dyn Write>,
    counter_columns: Option<Vec<String>>,
}

impl CsvReporter {
    #[must_use]
    pub fn new(out: Box<dyn Write>) -> Self {
        Self {
            out,
            counter_columns: None,
        }
    }

    fn print_header(&mut self, first_batch: &[Run]) {
        let mut counter_columns: Vec<String> = first_batch
            .iter()
            .flat_map(|run| run.counters.keys().cloned())
            .collect();
        counter_columns.sort();
        counter_columns.dedup();

        let _ = write!(
            self.out,
            "name,iterations,real_time,cpu_time,time_unit,label,error_occurred,error_message"
        );
        for column in &counter_columns {
            let _ = write!(self.out, ",\"{column}\"");
        }
        let _ = writeln!(self.out);

        self.counter_columns = Some(counter_columns);
    }

    fn print_run(&mut self, run: &Run) {
        let _ = write!(
            self.out,
            "\"{}\",{},{},{},{},\"{}\",{},\"{}\"",
            escape(&run.run_name),
            run.iterations,
            run.adjusted_real_time(),
            run.adjusted_cpu_time(),
            run.time_unit.label(),
            escape(&run.report_label),
            run.error_occurred,
            escape(&run.error_message),
        );

        let columns = self
            .counter_columns
            .as_ref()
            .expect("header is printed before any run");
        for column in columns {
            match run.counters.get(column) {
                Some(counter) => {
                    let _ = write!(self.out, ",{}", counter.value);
                }
                None => {
                    let _ = write!(self.out, ",");
                }
            }
        }

        let _ = writeln!(self.out);
    }
}

fn escape(field: &str) -> String {
    field.replace('"', "\"\"")
}

impl Reporter for CsvReporter {
    fn report_context(&mut self, _context: &Context) -> bool {
        true
    }

    fn report_runs(&mut self, runs: &[Run]) {
        if self.counter_columns.is_none() {
            self.print_header(runs);
        }

        for run in runs {
            self.print_run(run);
        }
    }

    fn finalize(&mut self) {
        let _ = self.out.flush();
    }
}
