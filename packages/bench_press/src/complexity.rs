//! Asymptotic complexity fitting across the instances of a benchmark family.

use crate::run::Run;

/// The complexity curve fitted over a family's per-instance measurements.
///
/// `Auto` tries every predefined curve and keeps the one with the lowest
/// root-mean-square residual; `Lambda` fits a caller-supplied curve function
/// of the instance's independent variable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BigO {
    O1,
    OLogN,
    ON,
    ONLogN,
    ONSquared,
    ONCubed,
    Auto,
    Lambda(fn(i64) -> f64),
}

impl BigO {
    /// The suffix reporters print after a fitted coefficient.
    #[must_use]
    pub fn notation(self) -> &'static str {
        match self {
            Self::O1 => "(1)",
            Self::OLogN => "(lgN)",
            Self::ON => "N",
            Self::ONLogN => "NlgN",
            Self::ONSquared => "N^2",
            Self::ONCubed => "N^3",
            Self::Auto | Self::Lambda(_) => "f(N)",
        }
    }

    /// Evaluates the curve's scaling function at `n`.
    fn curve(self, n: i64) -> f64 {
        if let Self::Lambda(f) = self {
            return f(n);
        }

        let n = n as f64;
        match self {
            Self::O1 => 1.0,
            Self::OLogN => n.log2(),
            Self::ON => n,
            Self::ONLogN => n * n.log2(),
            Self::ONSquared => n * n,
            Self::ONCubed => n * n * n,
            Self::Lambda(_) => unreachable!("handled above"),
            Self::Auto => {
                unreachable!("auto complexity resolves to a concrete curve before evaluation")
            }
        }
    }
}

/// The result of fitting one curve to a family's measurements.
#[derive(Clone, Copy, Debug)]
struct LeastSq {
    coef: f64,
    rms: f64,
    complexity: BigO,
}

/// Fits `time = coef * curve(n)` by least squares and reports the
/// coefficient along with the mean-normalized RMS residual.
fn minimal_least_sq(n: &[i64], time: &[f64], fit: BigO) -> LeastSq {
    debug_assert_eq!(n.len(), time.len());

    let mut sigma_gn_squared = 0.0;
    let mut sigma_time = 0.0;
    let mut sigma_time_gn = 0.0;

    for (&n_i, &time_i) in n.iter().zip(time) {
        let gn_i = fit.curve(n_i);
        sigma_gn_squared += gn_i * gn_i;
        sigma_time += time_i;
        sigma_time_gn += time_i * gn_i;
    }

    let coef = sigma_time_gn / sigma_gn_squared;

    let mut rms = 0.0;
    for (&n_i, &time_i) in n.iter().zip(time) {
        let fitted = coef * fit.curve(n_i);
        rms += (time_i - fitted) * (time_i - fitted);
    }

    let mean = sigma_time / n.len() as f64;

    LeastSq {
        coef,
        rms: (rms / n.len() as f64).sqrt() / mean,
        complexity: fit,
    }
}

/// Fits the requested curve, resolving `Auto` to whichever predefined curve
/// yields the lowest residual.
fn fit_curve(n: &[i64], time: &[f64], requested: BigO) -> LeastSq {
    if requested != BigO::Auto {
        return minimal_least_sq(n, time, requested);
    }

    const CANDIDATES: [BigO; 5] = [
        BigO::OLogN,
        BigO::ON,
        BigO::ONLogN,
        BigO::ONSquared,
        BigO::ONCubed,
    ];

    let mut best = minimal_least_sq(n, time, BigO::O1);
    for candidate in CANDIDATES {
        let current = minimal_least_sq(n, time, candidate);
        if current.rms < best.rms {
            best = current;
        }
    }

    best
}

/// Produces the two synthetic aggregate rows for a completed family: the
/// fitted coefficient (`<family>_BigO`) and the normalized RMS residual
/// (`<family>_RMS`).
///
/// Returns nothing when fewer than two runs are available to fit against.
pub(crate) fn compute_big_o(family_name: &str, reports: &[Run]) -> Vec<Run> {
    if reports.len() < 2 {
        return Vec::new();
    }

    let Some(requested) = reports[0].complexity else {
        return Vec::new();
    };

    let mut n = Vec::with_capacity(reports.len());
    let mut real_time = Vec::with_capacity(reports.len());
    let mut cpu_time = Vec::with_capacity(reports.len());

    for run in reports {
        n.push(run.complexity_n);
        real_time.push(run.real_accumulated_time / run.iterations as f64);
        cpu_time.push(run.cpu_accumulated_time / run.iterations as f64);
    }

    // The processor-time fit picks the curve; the wall-clock fit reuses it so
    // both rows describe the same asymptotic class.
    let result_cpu = fit_curve(&n, &cpu_time, requested);
    let result_real = fit_curve(&n, &real_time, result_cpu.complexity);

    let front = &reports[0];

    let mut big_o = Run::new(
        format!("{family_name}_BigO"),
        front.family_index,
        front.per_family_instance_index,
    );
    big_o.aggregate_name = Some("BigO".to_string());
    big_o.threads = front.threads;
    big_o.time_unit = front.time_unit;
    big_o.report_label = front.report_label.clone();
    big_o.real_accumulated_time = result_real.coef;
    big_o.cpu_accumulated_time = result_cpu.coef;
    big_o.complexity = Some(result_cpu.complexity);
    big_o.report_big_o = true;

    // The residual is a dimensionless fraction; pre-divide by the unit
    // multiplier so the adjusted value reporters print is the raw fraction.
    let multiplier = front.time_unit.multiplier();

    let mut rms = Run::new(
        format!("{family_name}_RMS"),
        front.family_index,
        front.per_family_instance_index,
    );
    rms.aggregate_name = Some("RMS".to_string());
    rms.threads = front.threads;
    rms.time_unit = front.time_unit;
    rms.report_label = front.report_label.clone();
    rms.real_accumulated_time = result_real.rms / multiplier;
    rms.cpu_accumulated_time = result_cpu.rms / multiplier;
    rms.complexity = Some(result_cpu.complexity);
    rms.report_rms = true;

    vec![big_o, rms]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::TimeUnit;

    fn linear_reports(family: &str) -> Vec<Run> {
        // cpu time per iteration is exactly 3ns * n: a perfect O(N) family.
        [1_i64, 2, 4, 8, 16]
            .iter()
            .map(|&n| {
                let mut run = Run::new(format!("{family}/{n}"), 0, 0);
                run.iterations = 100;
                run.complexity_n = n;
                run.cpu_accumulated_time = 3e-9 * n as f64 * 100.0;
                run.real_accumulated_time = 6e-9 * n as f64 * 100.0;
                run.complexity = Some(BigO::ON);
                run.time_unit = TimeUnit::Nanosecond;
                run
            })
            .collect()
    }

    #[test]
    fn perfect_linear_fit_recovers_coefficient() {
        let rows = compute_big_o("bm_linear", &linear_reports("bm_linear"));

        assert_eq!(rows.len(), 2);

        let big_o = &rows[0];
        assert_eq!(big_o.run_name, "bm_linear_BigO");
        assert!(big_o.report_big_o);
        assert_eq!(big_o.iterations, 0);
        assert!((big_o.cpu_accumulated_time - 3e-9).abs() < 1e-15);
        assert!((big_o.real_accumulated_time - 6e-9).abs() < 1e-15);

        let rms = &rows[1];
        assert_eq!(rms.run_name, "bm_linear_RMS");
        assert!(rms.report_rms);
        assert!(rms.cpu_accumulated_time.abs() < 1e-9);
    }

    #[test]
    fn auto_picks_the_best_candidate() {
        let mut reports = linear_reports("bm_auto");
        for run in &mut reports {
            run.complexity = Some(BigO::Auto);
        }

        let rows = compute_big_o("bm_auto", &reports);

        assert_eq!(rows[0].complexity, Some(BigO::ON));
    }

    #[test]
    fn lambda_curve_is_honored() {
        let mut reports = linear_reports("bm_lambda");
        let curve: fn(i64) -> f64 = |n| n as f64;
        for run in &mut reports {
            run.complexity = Some(BigO::Lambda(curve));
        }

        let rows = compute_big_o("bm_lambda", &reports);

        assert!((rows[0].cpu_accumulated_time - 3e-9).abs() < 1e-15);
        assert_eq!(rows[0].complexity, Some(BigO::Lambda(curve)));
    }

    #[test]
    fn too_few_runs_produce_no_rows() {
        let reports = &linear_reports("bm")[..1];

        assert!(compute_big_o("bm", reports).is_empty());
    }
}
