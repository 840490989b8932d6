//! Human-oriented console output.

use std::io::Write;

use crate::reporter::{Context, Reporter};
use crate::run::Run;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Writes runs as aligned console lines.
pub struct ConsoleReporter {
    out: Box<dyn Write>,
    color: bool,
    counters_tabular: bool,
    name_field_width: usize,
    printed_header: bool,
}

impl ConsoleReporter {
    /// A plain reporter writing to standard output.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Too difficult to test stdout output reliably.
    pub fn new() -> Self {
        Self::with_options(Box::new(std::io::stdout()), false, false)
    }

    /// A reporter writing to `out` with explicit color and counter-layout
    /// choices.
    #[must_use]
    pub fn with_options(out: Box<dyn Write>, color: bool, counters_tabular: bool) -> Self {
        Self {
            out,
            color,
            counters_tabular,
            name_field_width: 10,
            printed_header: false,
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn print_header(&mut self) {
        let width = self.name_field_width;
        let _ = writeln!(
            self.out,
            "{:-<width$}-----------------------------------------",
            ""
        );
        let _ = writeln!(
            self.out,
            "{:<width$} {:>13} {:>13} {:>10}",
            "Benchmark", "Time", "CPU", "Iterations"
        );
        let _ = writeln!(
            self.out,
            "{:-<width$}-----------------------------------------",
            ""
        );
    }

    fn print_run(&mut self, run: &Run) {
        let name = self.paint(GREEN, &run.run_name);
        let width = self.name_field_width + if self.color { GREEN.len() + RESET.len() } else { 0 };
        let _ = write!(self.out, "{name:<width$}");

        if run.error_occurred {
            let message = self.paint(RED, &format!("ERROR OCCURRED: '{}'", run.error_message));
            let _ = writeln!(self.out, " {message}");
            return;
        }

        if run.report_big_o {
            let notation = run
                .complexity
                .map(|c| c.notation())
                .unwrap_or_default();
            let _ = write!(
                self.out,
                " {:>10.2} {notation:<4} {:>10.2} {notation:<4}",
                run.adjusted_real_time(),
                run.adjusted_cpu_time()
            );
        } else if run.report_rms {
            let _ = write!(
                self.out,
                " {:>10.0} % {:>10.0} %",
                run.adjusted_real_time() * 100.0,
                run.adjusted_cpu_time() * 100.0
            );
        } else {
            let unit = run.time_unit.label();
            let _ = write!(
                self.out,
                " {:>10.1} {unit:<2} {:>10.1} {unit:<2}",
                run.adjusted_real_time(),
                run.adjusted_cpu_time()
            );
            if run.iterations != 0 {
                let _ = write!(self.out, " {:>10}", run.iterations);
            }
        }

        if !run.report_label.is_empty() {
            let _ = write!(self.out, " {}", run.report_label);
        }

        for (name, counter) in &run.counters {
            if self.counters_tabular {
                let _ = write!(self.out, " {:>12.4}", counter.value);
            } else {
                let _ = write!(self.out, " {name}={:.4}", counter.value);
            }
        }

        if let Some(memory) = run.memory_usage {
            let _ = write!(
                self.out,
                " allocs={} peak_bytes={}",
                memory.num_allocs, memory.max_bytes_used
            );
        }

        let _ = writeln!(self.out);
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn report_context(&mut self, context: &Context) -> bool {
        self.name_field_width = context.name_field_width.max(10);

        for (key, value) in &context.global_context {
            let line = self.paint(YELLOW, &format!("{key}: {value}"));
            let _ = writeln!(self.out, "{line}");
        }

        true
    }

    fn report_runs(&mut self, runs: &[Run]) {
        if !self.printed_header {
            self.print_header();
            self.printed_header = true;
        }

        // When counters are tabular, name the columns once above the rows.
        if self.counters_tabular {
            if let Some(first) = runs.first().filter(|r| !r.counters.is_empty()) {
                let width = self.name_field_width;
                let _ = write!(self.out, "{:<width$}", "");
                for name in first.counters.keys() {
                    let _ = write!(self.out, " {name:>12}");
                }
                let _ = writeln!(self.out);
            }
        }

        for run in runs {
            self.print_run(run);
        }
    }

    fn finalize(&mut self) {
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::run::TimeUnit;

    /// A writer the test can inspect after the reporter is done with it.
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn sample_run(name: &str) -> Run {
        let mut run = Run::new(name.to_string(), 0, 0);
        run.iterations = 1000;
        run.real_accumulated_time = 1e-3;
        run.cpu_accumulated_time = 5e-4;
        run.time_unit = TimeUnit::Microsecond;
        run
    }

    #[test]
    fn prints_name_times_and_iterations() {
        let buffer = SharedBuffer::default();
        let mut reporter =
            ConsoleReporter::with_options(Box::new(buffer.clone()), false, false);

        reporter.report_context(&Context::default());
        reporter.report_runs(&[sample_run("bm_sample/8")]);
        reporter.finalize();

        let output = buffer.contents();
        assert!(output.contains("Benchmark"));
        assert!(output.contains("bm_sample/8"));
        assert!(output.contains("1000"));
        assert!(output.contains("us"));
    }

    #[test]
    fn errors_replace_the_measurement_columns() {
        let mut run = sample_run("bm_broken");
        run.error_occurred = true;
        run.error_message = "resource missing".to_string();

        let buffer = SharedBuffer::default();
        let mut reporter =
            ConsoleReporter::with_options(Box::new(buffer.clone()), false, false);
        reporter.report_runs(&[run]);

        let output = buffer.contents();
        assert!(output.contains("ERROR OCCURRED: 'resource missing'"));
        assert!(!output.contains("us"));
    }

    #[test]
    fn global_context_is_echoed() {
        let buffer = SharedBuffer::default();
        let mut reporter =
            ConsoleReporter::with_options(Box::new(buffer.clone()), false, false);

        let mut context = Context::default();
        context
            .global_context
            .insert("branch".to_string(), "main".to_string());
        reporter.report_context(&context);

        assert!(buffer.contents().contains("branch: main"));
    }
}
