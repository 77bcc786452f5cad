use crate::matrix::CsrMatrix;

/// Smallest penalty for which `x = 0` solves the Lasso: `max_j |(A^T b)_j|`.
///
/// Zero when `b` is zero or `A` has no non-zeros.
pub fn lambda_max(matrix: &CsrMatrix, b: &[f64]) -> f64 {
    let mut u = vec![0.0; matrix.ncols()];
    matrix.mul_transpose_vec(b, &mut u);
    u.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()))
}

/// Log-spaced penalties from `lambda_max` down to `min_ratio * lambda_max`.
///
/// Values are computed independently from their index, so the schedule can be
/// walked lazily, restarted, or indexed directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambdaSchedule {
    lambda_max: f64,
    min_ratio: f64,
    len: usize,
    log_max: f64,
    log_min: f64,
}

impl LambdaSchedule {
    /// Returns `None` when the schedule is degenerate: `lambda_max` is not a
    /// positive finite number, `len` is zero, or `min_ratio` is outside `(0, 1)`.
    /// No logarithm is taken in that case.
    pub fn new(lambda_max: f64, len: usize, min_ratio: f64) -> Option<Self> {
        if !(lambda_max > 0.0) || !lambda_max.is_finite() || len == 0 {
            return None;
        }
        if !(min_ratio > 0.0 && min_ratio < 1.0) {
            return None;
        }
        let lambda_min = min_ratio * lambda_max;
        if !(lambda_min > 0.0) {
            return None;
        }
        Some(Self {
            lambda_max,
            min_ratio,
            len,
            log_max: lambda_max.ln(),
            log_min: lambda_min.ln(),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn lambda_max(&self) -> f64 {
        self.lambda_max
    }

    pub fn min_ratio(&self) -> f64 {
        self.min_ratio
    }

    /// Penalty at step `i`; the two endpoints are returned exactly.
    ///
    /// # Panics
    /// If `i >= len()`.
    pub fn lambda(&self, i: usize) -> f64 {
        assert!(i < self.len, "step {i} out of range for schedule of {}", self.len);
        if i == 0 {
            return self.lambda_max;
        }
        let last = self.len - 1;
        if i == last {
            return self.min_ratio * self.lambda_max;
        }
        let hi = (last - i) as f64;
        let lo = i as f64;
        ((self.log_max * hi + self.log_min * lo) / last as f64).exp()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len).map(move |i| self.lambda(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lambda_max_of_scaled_identity() {
        let a = CsrMatrix::new(2, 2, vec![0, 1, 2], vec![0, 1], vec![2.0, 3.0]).unwrap();
        assert_eq!(lambda_max(&a, &[1.0, 1.0]), 3.0);
    }

    #[test]
    fn lambda_max_uses_magnitude() {
        let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, -4.0), (1, 1, 1.0), (1, 0, 1.0)]).unwrap();
        // A^T b = [-4 + 1, 1] for b = [1, 1]
        assert_eq!(lambda_max(&a, &[1.0, 1.0]), 3.0);
    }

    #[test]
    fn lambda_max_of_zero_data() {
        let a = CsrMatrix::new(2, 2, vec![0, 0, 0], vec![], vec![]).unwrap();
        assert_eq!(lambda_max(&a, &[1.0, 2.0]), 0.0);
        let a = CsrMatrix::new(2, 2, vec![0, 1, 2], vec![0, 1], vec![2.0, 3.0]).unwrap();
        assert_eq!(lambda_max(&a, &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn endpoints_are_exact() {
        let schedule = LambdaSchedule::new(7.5, 100, 1e-2).unwrap();
        assert_eq!(schedule.lambda(0), 7.5);
        assert_eq!(schedule.lambda(99), 7.5e-2);
        assert_eq!(schedule.iter().count(), 100);
    }

    #[test]
    fn interior_points_are_geometric() {
        let schedule = LambdaSchedule::new(1.0, 3, 1e-2).unwrap();
        assert!((schedule.lambda(1) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn strictly_decreasing() {
        for &len in &[2usize, 3, 10, 100, 1000] {
            let schedule = LambdaSchedule::new(123.0, len, 1e-2).unwrap();
            let values: Vec<f64> = schedule.iter().collect();
            assert!(values.windows(2).all(|w| w[0] > w[1]), "len {len}");
        }
    }

    #[test]
    fn single_step_is_lambda_max() {
        let schedule = LambdaSchedule::new(2.0, 1, 1e-2).unwrap();
        assert_eq!(schedule.iter().collect::<Vec<_>>(), vec![2.0]);
    }

    #[test]
    fn restartable() {
        let schedule = LambdaSchedule::new(5.0, 10, 1e-2).unwrap();
        let first: Vec<f64> = schedule.iter().collect();
        let second: Vec<f64> = schedule.iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(LambdaSchedule::new(0.0, 10, 1e-2).is_none());
        assert!(LambdaSchedule::new(-1.0, 10, 1e-2).is_none());
        assert!(LambdaSchedule::new(f64::NAN, 10, 1e-2).is_none());
        assert!(LambdaSchedule::new(f64::INFINITY, 10, 1e-2).is_none());
        assert!(LambdaSchedule::new(1.0, 0, 1e-2).is_none());
        assert!(LambdaSchedule::new(1.0, 10, 1.0).is_none());
        assert!(LambdaSchedule::new(1.0, 10, 0.0).is_none());
    }
}
