use faer_core::Parallelism;
use rayon::prelude::*;

// Below this length the rayon split costs more than the reduction.
const PARALLEL_MIN_LEN: usize = 4096;

/// Outcome of comparing an iterate against the previous one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stability {
    /// `max_j |x_j - prev_j|`
    pub max_diff: f64,
    /// `sum_j |x_j|`
    pub abs_sum: f64,
    pub stop: bool,
}

/// `max_j |x_j - prev_j|`; NaN if any difference is NaN.
///
/// # Panics
/// If `x` and `prev` have different lengths.
pub fn max_abs_diff(x: &[f64], prev: &[f64], parallelism: Parallelism) -> f64 {
    assert_eq!(x.len(), prev.len());
    match parallelism {
        Parallelism::None => x
            .iter()
            .zip(prev)
            .fold(0.0_f64, |acc, (a, b)| nan_max(acc, (a - b).abs())),
        _ => x
            .par_iter()
            .zip(prev.par_iter())
            .with_min_len(PARALLEL_MIN_LEN)
            .map(|(a, b)| (a - b).abs())
            .reduce(|| 0.0, nan_max),
    }
}

// `f64::max` discards NaN operands; this keeps them.
fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || a > b {
        a
    } else {
        b
    }
}

/// `sum_j |x_j|`.
pub fn abs_sum(x: &[f64], parallelism: Parallelism) -> f64 {
    match parallelism {
        Parallelism::None => x.iter().map(|v| v.abs()).sum(),
        _ => x
            .par_iter()
            .with_min_len(PARALLEL_MIN_LEN)
            .map(|v| v.abs())
            .sum(),
    }
}

/// Early-stop test: `max_diff < tol * abs_sum`, or the iterates are identical.
///
/// Identical iterates (`max_diff == 0`) always stop, including the all-zero
/// case where the strict inequality would read `0 < 0`. A previous iterate
/// filled with `f64::MAX` never stops, and neither does an iterate holding
/// NaN or infinite entries.
///
/// # Panics
/// If `x` and `prev` have different lengths.
pub fn check_stability(x: &[f64], prev: &[f64], tol: f64, parallelism: Parallelism) -> Stability {
    let max_diff = max_abs_diff(x, prev, parallelism);
    let abs_sum = abs_sum(x, parallelism);
    let finite = max_diff.is_finite() && abs_sum.is_finite();
    let stop = finite && (max_diff < tol * abs_sum || max_diff == 0.0);
    Stability {
        max_diff,
        abs_sum,
        stop,
    }
}
