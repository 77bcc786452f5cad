//! Seeded synthetic Lasso instances for tests and benchmarks.

use core::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::matrix::{CsrMatrix, MatrixError};

/// Random sparse matrix with roughly `approx_nnz` entries drawn uniformly from `range`.
///
/// Positions are sampled with replacement and deduplicated, so the returned
/// matrix's `nnz()` can fall short of the request; it is the authoritative count.
pub fn random_sparse<R: Rng>(
    nrows: usize,
    ncols: usize,
    approx_nnz: usize,
    range: RangeInclusive<f64>,
    rng: &mut R,
) -> Result<CsrMatrix, MatrixError> {
    let target = approx_nnz.min(nrows.saturating_mul(ncols));
    let mut positions: Vec<(usize, usize)> = (0..target)
        .map(|_| (rng.gen_range(0..nrows), rng.gen_range(0..ncols)))
        .collect();
    positions.sort_unstable();
    positions.dedup();

    let mut row_ptrs = vec![0usize; nrows + 1];
    let mut col_indices = Vec::with_capacity(positions.len());
    let mut values = Vec::with_capacity(positions.len());
    for &(row, col) in &positions {
        row_ptrs[row + 1] += 1;
        col_indices.push(col);
        values.push(rng.gen_range(range.clone()));
    }
    for row in 0..nrows {
        row_ptrs[row + 1] += row_ptrs[row];
    }
    CsrMatrix::new(nrows, ncols, row_ptrs, col_indices, values)
}

/// Observations `scale * N(0, 1)`.
pub fn random_observations<R: Rng>(nrows: usize, scale: f64, rng: &mut R) -> Vec<f64> {
    (0..nrows)
        .map(|_| scale * rng.sample::<f64, _>(StandardNormal))
        .collect()
}

/// Lasso benchmark instance: entries of A uniform in `[-1, 1]`, `b = 4 * N(0, 1)`.
pub fn lasso_instance(
    nrows: usize,
    ncols: usize,
    approx_nnz: usize,
    seed: u64,
) -> Result<(CsrMatrix, Vec<f64>), MatrixError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let a = random_sparse(nrows, ncols, approx_nnz, -1.0..=1.0, &mut rng)?;
    let b = random_observations(nrows, 4.0, &mut rng);
    Ok((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_shape_and_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = random_sparse(40, 30, 200, -1.0..=1.0, &mut rng).unwrap();
        assert_eq!(a.nrows(), 40);
        assert_eq!(a.ncols(), 30);
        assert!(a.nnz() <= 200);
        assert!(a.nnz() > 150);
        assert!(a.values().iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn caps_at_dense() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = random_sparse(2, 3, 1000, 0.5..=1.0, &mut rng).unwrap();
        assert!(a.nnz() <= 6);
    }

    #[test]
    fn seeded_instances_repeat() {
        let (a1, b1) = lasso_instance(20, 10, 50, 42).unwrap();
        let (a2, b2) = lasso_instance(20, 10, 50, 42).unwrap();
        assert_eq!(a1.col_indices(), a2.col_indices());
        assert_eq!(a1.values(), a2.values());
        assert_eq!(b1, b2);
    }
}
