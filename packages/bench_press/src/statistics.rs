//! Statistics applied across the repetitions of a benchmark instance.

use crate::counter::{Counter, UserCounters};
use crate::run::Run;

/// The signature of a statistic: reduces the per-repetition samples of one
/// measurement to a single value.
pub type StatisticFn = fn(&[f64]) -> f64;

/// A named statistic computed across repetitions.
///
/// Every family is pre-seeded with mean, median and standard deviation;
/// additional statistics can be attached via
/// [`Benchmark::compute_statistics`](crate::Benchmark::compute_statistics).
#[derive(Clone, Debug)]
pub struct Statistic {
    pub name: String,
    pub compute: StatisticFn,
}

impl Statistic {
    #[must_use]
    pub fn new(name: impl Into<String>, compute: StatisticFn) -> Self {
        Self {
            name: name.into(),
            compute,
        }
    }
}

/// The statistics every family starts with.
pub(crate) fn default_statistics() -> Vec<Statistic> {
    vec![
        Statistic::new("mean", statistics_mean),
        Statistic::new("median", statistics_median),
        Statistic::new("stddev", statistics_stddev),
    ]
}

/// Arithmetic mean; zero for an empty sample.
#[must_use]
pub fn statistics_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.iter().sum::<f64>() / values.len() as f64
}

/// Median; the mean of the two central elements for even-sized samples.
#[must_use]
pub fn statistics_median(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return statistics_mean(values);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let center = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[center]
    } else {
        (sorted[center - 1] + sorted[center]) / 2.0
    }
}

/// Sample standard deviation; zero for samples of fewer than two elements.
#[must_use]
pub fn statistics_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let mean = statistics_mean(values);
    let avg_squares = values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64;
    let n = values.len() as f64;

    (n / (n - 1.0) * (avg_squares - mean * mean)).max(0.0).sqrt()
}

/// Applies every statistic descriptor across an instance's per-repetition
/// runs, synthesizing one aggregate [`Run`] per descriptor.
///
/// Runs that ended in an error are excluded from the samples. Aggregate run
/// names are `<run_name>_<statistic>`; the iteration count carried is the
/// converged per-repetition count, which is identical across repetitions.
pub(crate) fn compute_aggregates(reports: &[Run], statistics: &[Statistic]) -> Vec<Run> {
    let usable: Vec<&Run> = reports.iter().filter(|r| !r.error_occurred).collect();

    let real_times: Vec<f64> = usable.iter().map(|r| r.real_accumulated_time).collect();
    let cpu_times: Vec<f64> = usable.iter().map(|r| r.cpu_accumulated_time).collect();
    let manual_times: Vec<f64> = usable.iter().map(|r| r.manual_accumulated_time).collect();

    // Collect per-key counter samples across the usable runs.
    let mut counter_samples: UserCounters = UserCounters::new();
    let mut counter_values: std::collections::BTreeMap<String, Vec<f64>> = Default::default();
    for run in &usable {
        for (name, counter) in &run.counters {
            counter_samples.entry(name.clone()).or_insert(*counter);
            counter_values
                .entry(name.clone())
                .or_default()
                .push(counter.value);
        }
    }

    let front = &reports[0];

    statistics
        .iter()
        .map(|statistic| {
            let mut aggregate = Run::new(
                format!("{}_{}", front.run_name, statistic.name),
                front.family_index,
                front.per_family_instance_index,
            );
            aggregate.aggregate_name = Some(statistic.name.clone());
            aggregate.iterations = front.iterations;
            aggregate.threads = front.threads;
            aggregate.time_unit = front.time_unit;
            aggregate.report_label = front.report_label.clone();
            aggregate.complexity = front.complexity;
            aggregate.complexity_n = front.complexity_n;
            aggregate.real_accumulated_time = (statistic.compute)(&real_times);
            aggregate.cpu_accumulated_time = (statistic.compute)(&cpu_times);
            aggregate.manual_accumulated_time = (statistic.compute)(&manual_times);

            for (name, values) in &counter_values {
                aggregate.counters.insert(
                    name.clone(),
                    Counter::new((statistic.compute)(values), counter_samples[name].flags),
                );
            }

            aggregate
        })
        .collect()
}
