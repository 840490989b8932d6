//! The ordered collection of registered benchmark families.

use std::io::Write;
use std::num::NonZero;
use std::sync::{LazyLock, Mutex};

use new_zealand::nz;

use crate::ERR_POISONED_LOCK;
use crate::benchmark::Benchmark;
use crate::filter::BenchmarkFilter;
use crate::instance::BenchmarkInstance;

/// Families whose expansion exceeds this many instances trigger a diagnostic
/// on the caller-supplied error stream.
const MAX_FAMILY_SIZE: usize = 100;

/// An ordered, mutex-guarded collection of benchmark families.
///
/// The process-wide registry backing
/// [`register_benchmark`](crate::register_benchmark) is one instance of this
/// type; owning a separate value (for example in tests, or to run several
/// independent suites) works identically.
#[derive(Debug, Default)]
pub struct BenchmarkFamilies {
    families: Mutex<Vec<Benchmark>>,
}

impl BenchmarkFamilies {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a family, returning the index assigned to it.
    pub fn add(&self, family: Benchmark) -> usize {
        let mut families = self.families.lock().expect(ERR_POISONED_LOCK);
        families.push(family);
        families.len() - 1
    }

    /// Drops every registered family.
    pub fn clear(&self) {
        self.families.lock().expect(ERR_POISONED_LOCK).clear();
    }

    /// Expands every registered family into its matching instances, in
    /// registration and cross-product order.
    ///
    /// Each family fans out into the cross-product of its argument tuples
    /// (an argument-less family counts as one empty tuple) and its thread
    /// counts (defaulting to the implicit single thread). The filter gates
    /// inclusion by expanded name; a family receives its dense
    /// `family_index` only once its first instance is included. Oversized
    /// families are reported to `err`.
    pub fn find(&self, filter: &BenchmarkFilter, err: &mut dyn Write) -> Vec<BenchmarkInstance> {
        // The implicit thread list for families that registered none.
        let one_thread: [NonZero<usize>; 1] = [nz!(1)];

        let families = self.families.lock().expect(ERR_POISONED_LOCK);
        let mut instances = Vec::new();
        let mut next_family_index = 0;

        for family in families.iter() {
            let family_index = next_family_index;
            let mut per_family_instance_index = 0;

            let empty_tuple = [Vec::new()];
            let arg_tuples: &[Vec<i64>] = if family.arg_tuples().is_empty() {
                &empty_tuple
            } else {
                family.arg_tuples()
            };

            let registered_threads = family.thread_count_list();
            let show_thread_count = !registered_threads.is_empty();
            let thread_counts: &[NonZero<usize>] = if registered_threads.is_empty() {
                &one_thread
            } else {
                registered_threads
            };

            let family_size = arg_tuples.len() * thread_counts.len();
            if family_size > MAX_FAMILY_SIZE {
                tracing::warn!(
                    family = family.display_name(),
                    family_size,
                    "benchmark family expands into a very large number of instances"
                );
                let _ = writeln!(
                    err,
                    "The number of inputs is very large. {} will be repeated at least {family_size} times.",
                    family.display_name()
                );
            }

            for args in arg_tuples {
                for &threads in thread_counts {
                    let instance = BenchmarkInstance::new(
                        family,
                        family_index,
                        per_family_instance_index,
                        args,
                        threads,
                        show_thread_count,
                    );

                    if !filter.matches(instance.name()) {
                        continue;
                    }

                    instances.push(instance);
                    per_family_instance_index += 1;

                    // Only claim the family index once at least one instance
                    // of this family is known to run.
                    if next_family_index == family_index {
                        next_family_index += 1;
                    }
                }
            }
        }

        instances
    }
}

/// The process-wide registry used by the global registration API.
static GLOBAL_FAMILIES: LazyLock<BenchmarkFamilies> = LazyLock::new(BenchmarkFamilies::new);

pub(crate) fn global_families() -> &'static BenchmarkFamilies {
    &GLOBAL_FAMILIES
}

/// Registers a benchmark family with the process-wide registry.
///
/// Returns the index assigned to the family.
pub fn register_benchmark(family: Benchmark) -> usize {
    global_families().add(family)
}

/// Drops every family registered with the process-wide registry.
pub fn clear_registered_benchmarks() {
    global_families().clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(name: &str) -> Benchmark {
        Benchmark::new(name, |state| while state.keep_running() {})
    }

    fn find_names(families: &BenchmarkFamilies, spec: &str) -> Vec<String> {
        let filter = BenchmarkFilter::compile(spec).unwrap();
        families
            .find(&filter, &mut std::io::sink())
            .iter()
            .map(|i| i.name().to_string())
            .collect()
    }

    #[test]
    fn families_expand_in_registration_order() {
        let families = BenchmarkFamilies::new();
        families.add(family("bm_b"));
        families.add(family("bm_a"));

        assert_eq!(find_names(&families, "."), vec!["bm_b", "bm_a"]);
    }

    #[test]
    fn expansion_is_the_args_times_threads_cross_product() {
        let families = BenchmarkFamilies::new();
        families.add(
            family("bm")
                .arg(1)
                .arg(2)
                .threads(nz!(1))
                .threads(nz!(2))
                .threads(nz!(4)),
        );

        let names = find_names(&families, ".");
        assert_eq!(
            names,
            vec![
                "bm/1/threads:1",
                "bm/1/threads:2",
                "bm/1/threads:4",
                "bm/2/threads:1",
                "bm/2/threads:2",
                "bm/2/threads:4",
            ]
        );
    }

    #[test]
    fn family_index_is_dense_over_matched_families() {
        let families = BenchmarkFamilies::new();
        families.add(family("alpha"));
        families.add(family("beta"));
        families.add(family("alpha_two"));

        let filter = BenchmarkFilter::compile("alpha").unwrap();
        let instances = families.find(&filter, &mut std::io::sink());

        let indices: Vec<usize> = instances.iter().map(BenchmarkInstance::family_index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn per_family_index_enumerates_matched_instances() {
        let families = BenchmarkFamilies::new();
        families.add(family("bm").arg(1).arg(2).arg(3));

        // Exclude the middle instance; the survivors renumber densely.
        let filter = BenchmarkFilter::compile("bm/(1|3)").unwrap();
        let instances = families.find(&filter, &mut std::io::sink());

        let indices: Vec<usize> = instances
            .iter()
            .map(BenchmarkInstance::per_family_instance_index)
            .collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn argless_family_counts_as_one_empty_tuple() {
        let families = BenchmarkFamilies::new();
        families.add(family("bm"));

        let filter = BenchmarkFilter::match_all();
        let instances = families.find(&filter, &mut std::io::sink());

        assert_eq!(instances.len(), 1);
        assert!(instances[0].args().is_empty());
    }

    #[test]
    fn oversized_family_is_reported() {
        let families = BenchmarkFamilies::new();
        families.add(family("bm_large").dense_range(1, 101, 1));

        let mut err = Vec::new();
        let _ = families.find(&BenchmarkFilter::match_all(), &mut err);

        let diagnostic = String::from_utf8(err).unwrap();
        assert!(diagnostic.contains("bm_large"));
        assert!(diagnostic.contains("101"));
    }

    #[test]
    fn clear_drops_registered_families() {
        let families = BenchmarkFamilies::new();
        families.add(family("bm"));
        families.clear();

        assert!(find_names(&families, ".").is_empty());
    }
}
