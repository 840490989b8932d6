//! Machine-oriented JSON output.

use std::io::Write;

use serde_json::json;

use crate::reporter::{Context, Reporter};
use crate::run::Run;

/// Streams runs as a single JSON document: a context object followed by a
/// `benchmarks` array.
pub struct JsonReporter {
    out: Box<dyn Write>,
    wrote_any_run: bool,
    opened: bool,
}

impl JsonReporter {
    #[must_use]
    pub fn new(out: Box<dyn Write>) -> Self {
        Self {
            out,
            wrote_any_run: false,
            opened: false,
        }
    }

    fn run_to_json(run: &Run) -> serde_json::Value {
        let mut object = json!({
            "name": run.run_name,
            "family_index": run.family_index,
            "per_family_instance_index": run.per_family_instance_index,
            "threads": run.threads,
            "iterations": run.iterations,
            "real_time": run.adjusted_real_time(),
            "cpu_time": run.adjusted_cpu_time(),
            "time_unit": run.time_unit.label(),
        });

        let fields = object
            .as_object_mut()
            .expect("the literal above is an object");

        if let Some(aggregate_name) = &run.aggregate_name {
            fields.insert("aggregate_name".to_string(), json!(aggregate_name));
        }
        if run.error_occurred {
            fields.insert("error_occurred".to_string(), json!(true));
            fields.insert("error_message".to_string(), json!(run.error_message));
        }
        if !run.report_label.is_empty() {
            fields.insert("label".to_string(), json!(run.report_label));
        }
        if run.report_big_o {
            let notation = run.complexity.map(|c| c.notation()).unwrap_or_default();
            fields.insert("big_o".to_string(), json!(notation));
        }
        if run.report_rms {
            fields.insert("rms".to_string(), json!(run.adjusted_cpu_time()));
        }
        for (name, counter) in &run.counters {
            fields.insert(name.clone(), json!(counter.value));
        }
        if let Some(memory) = run.memory_usage {
            fields.insert("allocs_per_iter".to_string(), json!(memory.num_allocs));
            fields.insert("max_bytes_used".to_string(), json!(memory.max_bytes_used));
        }

        object
    }
}

impl Reporter for JsonReporter {
    fn report_context(&mut self, context: &Context) -> bool {
        let context_json = json!({
            "name_field_width": context.name_field_width,
            "context": context.global_context,
        });

        let _ = write!(self.out, "{{\n  \"context\": {context_json},\n  \"benchmarks\": [");
        self.opened = true;

        true
    }

    fn report_runs(&mut self, runs: &[Run]) {
        if !self.opened {
            let _ = write!(self.out, "{{\n  \"benchmarks\": [");
            self.opened = true;
        }

        for run in runs {
            if self.wrote_any_run {
                let _ = write!(self.out, ",");
            }
            self.wrote_any_run = true;

            let _ = write!(self.out, "\n    {}", Self::run_to_json(run));
        }
    }

    fn finalize(&mut self) {
        if self.opened {
            let _ = writeln!(self.out, "\n  ]\n}}");
        }
        let _ = self.out.flush();
    }
}
