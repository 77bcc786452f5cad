use core::fmt;

use dyn_stack::{GlobalPodBuffer, PodStack, ReborrowMut};
use faer_core::mat;
use faer_core::sparse::SparseColMatRef;
use faer_core::{Conj, Parallelism};
use faer_sparse::qr::{factorize_symbolic_qr, QrSymbolicParams, SymbolicQr};
use std::time::Instant;

use crate::engine::{check_dimensions, Engine, EngineStats, EngineStatus, Iterate, SolveError};
use crate::function::{separable_sum, FunctionDescriptor};
use crate::matrix::{AugmentedPattern, CsrMatrix};
use crate::report::{emit_line, format_duration};

/// Errors while constructing the solver.
#[derive(Debug)]
pub enum SolverError {
    /// The matrix has zero rows or columns.
    InvalidDimensions { nrows: usize, ncols: usize },
    /// faer reported an error during symbolic analysis.
    Faer(faer_sparse::FaerError),
    /// Workspace requirement overflowed.
    WorkspaceOverflow,
    /// Workspace allocation failed.
    WorkspaceAlloc,
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimensions { nrows, ncols } => {
                write!(f, "invalid dimensions: nrows={nrows}, ncols={ncols}")
            }
            Self::Faer(err) => write!(f, "faer error: {err:?}"),
            Self::WorkspaceOverflow => write!(f, "workspace size overflow"),
            Self::WorkspaceAlloc => write!(f, "workspace allocation failed"),
        }
    }
}

impl std::error::Error for SolverError {}

/// Options controlling the ADMM solve.
#[derive(Debug, Clone)]
pub struct AdmmOptions {
    /// Augmented Lagrangian penalty; must be positive.
    pub rho: f64,
    /// Absolute tolerance on the primal and dual residuals.
    pub abs_tol: f64,
    /// Relative tolerance on the primal and dual residuals.
    pub rel_tol: f64,
    /// Maximum number of iterations per solve.
    pub max_iters: usize,
    /// Print a one-line summary of every solve.
    pub verbose: bool,
}

impl Default for AdmmOptions {
    fn default() -> Self {
        Self {
            rho: 1.0,
            abs_tol: 1e-4,
            rel_tol: 1e-3,
            max_iters: 2500,
            verbose: false,
        }
    }
}

/// Graph-form ADMM for `minimize f(y) + g(x)  s.t.  y = A x`.
///
/// Each iteration applies the proximal operators of `f` and `g`, then projects
/// onto the graph `y = A x` by solving `min ||A x - d||^2 + ||x - c||^2` with a
/// sparse QR factorization of `[A; I]`. The symbolic factorization is computed
/// once at construction; scaled duals are kept between solves so consecutive
/// calls along a path start close to the previous fixed point.
pub struct AdmmSolver {
    options: AdmmOptions,
    augmented: AugmentedPattern,
    symbolic_qr: SymbolicQr<usize>,
    qr_indices: Vec<usize>,
    qr_values: Vec<f64>,
    qr_stack: GlobalPodBuffer,
    parallelism: Parallelism,
    row_ptrs: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f64>,
    rhs: Vec<f64>,
    x_half: Vec<f64>,
    x_dual: Vec<f64>,
    x_prev: Vec<f64>,
    y_half: Vec<f64>,
    y_dual: Vec<f64>,
    y_prev: Vec<f64>,
}

impl AdmmSolver {
    /// Create a solver for the sparsity pattern of `matrix`.
    pub fn new(matrix: &CsrMatrix, parallelism: Parallelism) -> Result<Self, SolverError> {
        if matrix.nrows() == 0 || matrix.ncols() == 0 {
            return Err(SolverError::InvalidDimensions {
                nrows: matrix.nrows(),
                ncols: matrix.ncols(),
            });
        }

        let augmented = AugmentedPattern::new(matrix);
        let symbolic_qr = factorize_symbolic_qr(
            augmented.as_symbolic(),
            QrSymbolicParams::default(),
        )
        .map_err(SolverError::Faer)?;

        let factor_req = symbolic_qr
            .factorize_numeric_qr_req::<f64>(parallelism)
            .map_err(|_| SolverError::WorkspaceOverflow)?;
        let solve_req = symbolic_qr
            .solve_in_place_req::<f64>(1, parallelism)
            .map_err(|_| SolverError::WorkspaceOverflow)?;
        let req = factor_req
            .try_or(solve_req)
            .map_err(|_| SolverError::WorkspaceOverflow)?;
        let qr_stack = GlobalPodBuffer::try_new(req).map_err(|_| SolverError::WorkspaceAlloc)?;

        let values = vec![0.0; augmented.nnz()];
        let qr_indices = vec![0usize; symbolic_qr.len_indices()];
        let qr_values = vec![0.0; symbolic_qr.len_values()];

        let m = matrix.nrows();
        let n = matrix.ncols();
        Ok(Self {
            options: AdmmOptions::default(),
            augmented,
            symbolic_qr,
            qr_indices,
            qr_values,
            qr_stack,
            parallelism,
            row_ptrs: matrix.row_ptrs().to_vec(),
            col_indices: matrix.col_indices().to_vec(),
            values,
            rhs: vec![0.0; m + n],
            x_half: vec![0.0; n],
            x_dual: vec![0.0; n],
            x_prev: vec![0.0; n],
            y_half: vec![0.0; m],
            y_dual: vec![0.0; m],
            y_prev: vec![0.0; m],
        })
    }

    pub fn with_options(mut self, options: AdmmOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &AdmmOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: AdmmOptions) {
        self.options = options;
    }

    fn check_matrix(&self, matrix: &CsrMatrix) -> Result<(), SolveError> {
        let rows = self.augmented.matrix_rows();
        if matrix.nrows() != rows {
            return Err(SolveError::DimensionMismatch {
                what: "matrix rows",
                expected: rows,
                actual: matrix.nrows(),
            });
        }
        let cols = self.augmented.ncols();
        if matrix.ncols() != cols {
            return Err(SolveError::DimensionMismatch {
                what: "matrix columns",
                expected: cols,
                actual: matrix.ncols(),
            });
        }
        if matrix.row_ptrs() != self.row_ptrs.as_slice()
            || matrix.col_indices() != self.col_indices.as_slice()
        {
            return Err(SolveError::PatternMismatch);
        }
        Ok(())
    }
}

impl Engine for AdmmSolver {
    fn solve(
        &mut self,
        matrix: &CsrMatrix,
        loss: &[FunctionDescriptor],
        penalty: &[FunctionDescriptor],
        iterate: &mut Iterate,
    ) -> Result<EngineStats, SolveError> {
        self.check_matrix(matrix)?;
        check_dimensions(matrix, loss, penalty, iterate)?;

        let start_time = self.options.verbose.then(Instant::now);
        let options = &self.options;
        let rho = options.rho;
        let m = matrix.nrows();
        let n = matrix.ncols();
        let eps_abs = options.abs_tol * ((m + n) as f64).sqrt();

        // Numeric QR of [A; I]; the projection reuses it every iteration.
        self.augmented.fill_values(matrix, 1.0, &mut self.values);
        let a = SparseColMatRef::<'_, usize, f64>::new(
            self.augmented.as_symbolic(),
            self.values.as_slice(),
        );
        let mut stack = PodStack::new(&mut self.qr_stack);
        let qr = self.symbolic_qr.factorize_numeric_qr::<f64>(
            &mut self.qr_indices,
            &mut self.qr_values,
            a,
            self.parallelism,
            stack.rb_mut(),
        );

        let x = &mut iterate.x;
        let y = &mut iterate.y;
        let mut status = EngineStatus::MaxIterations;
        let mut iterations = options.max_iters;
        let mut primal = f64::INFINITY;
        let mut dual = f64::INFINITY;

        for iter in 0..options.max_iters {
            self.x_prev.copy_from_slice(x);
            self.y_prev.copy_from_slice(y);

            for (j, term) in penalty.iter().enumerate() {
                self.x_half[j] = term.prox(x[j] - self.x_dual[j], rho);
            }
            for (i, term) in loss.iter().enumerate() {
                self.y_half[i] = term.prox(y[i] - self.y_dual[i], rho);
            }

            // Project (x_half + x_dual, y_half + y_dual) onto y = A x.
            for i in 0..m {
                self.rhs[i] = self.y_half[i] + self.y_dual[i];
            }
            for j in 0..n {
                self.rhs[m + j] = self.x_half[j] + self.x_dual[j];
            }
            let rhs_mat = mat::from_column_major_slice_mut::<f64>(&mut self.rhs, m + n, 1);
            let mut stack = PodStack::new(&mut self.qr_stack);
            qr.solve_in_place_with_conj(Conj::No, rhs_mat, self.parallelism, stack.rb_mut());
            x.copy_from_slice(&self.rhs[..n]);
            matrix.mul_vec(x, y);

            let mut primal_sq = 0.0;
            let mut dual_sq = 0.0;
            for j in 0..n {
                let gap = self.x_half[j] - x[j];
                self.x_dual[j] += gap;
                primal_sq += gap * gap;
                let step = x[j] - self.x_prev[j];
                dual_sq += step * step;
            }
            for i in 0..m {
                let gap = self.y_half[i] - y[i];
                self.y_dual[i] += gap;
                primal_sq += gap * gap;
                let step = y[i] - self.y_prev[i];
                dual_sq += step * step;
            }
            primal = primal_sq.sqrt();
            dual = rho * dual_sq.sqrt();

            if !primal.is_finite() || !dual.is_finite() {
                status = EngineStatus::NumericalFailure;
                iterations = iter + 1;
                break;
            }

            let half_norm = (sum_sq(&self.x_half) + sum_sq(&self.y_half)).sqrt();
            let proj_norm = (sum_sq(x) + sum_sq(y)).sqrt();
            let dual_norm = (sum_sq(&self.x_dual) + sum_sq(&self.y_dual)).sqrt();
            let eps_primal = eps_abs + options.rel_tol * half_norm.max(proj_norm);
            let eps_dual = eps_abs + options.rel_tol * rho * dual_norm;

            log::trace!(
                "admm iter {iter}: primal={primal:.3e} (eps {eps_primal:.3e}) dual={dual:.3e} (eps {eps_dual:.3e})"
            );

            if primal <= eps_primal && dual <= eps_dual {
                status = EngineStatus::Converged;
                iterations = iter + 1;
                break;
            }
        }

        if status == EngineStatus::NumericalFailure {
            // Fall back to the last finite iterate and drop the poisoned duals.
            if self.x_prev.iter().chain(&self.y_prev).all(|v| v.is_finite()) {
                x.copy_from_slice(&self.x_prev);
                y.copy_from_slice(&self.y_prev);
            } else {
                x.fill(0.0);
                y.fill(0.0);
            }
            self.x_dual.fill(0.0);
            self.y_dual.fill(0.0);
            log::warn!("admm hit a non-finite state after {iterations} iterations; duals cleared");
        } else {
            // Report the proximal iterate: it carries the exact zeros of the penalty.
            x.copy_from_slice(&self.x_half);
            matrix.mul_vec(x, y);
        }
        let objective = separable_sum(loss, y) + separable_sum(penalty, x);

        log::debug!(
            "admm {status} after {iterations} iterations: objective={objective:.6e} primal={primal:.2e} dual={dual:.2e}"
        );
        if let Some(start) = start_time {
            emit_line(&format!(
                "admm: {status} in {iterations} iterations, objective {objective:.6e}, time {}",
                format_duration(start.elapsed())
            ));
        }

        Ok(EngineStats {
            status,
            iterations,
            objective,
            primal_residual: primal,
            dual_residual: dual,
        })
    }

    fn reset(&mut self) {
        self.x_dual.fill(0.0);
        self.y_dual.fill(0.0);
    }
}

fn sum_sq(x: &[f64]) -> f64 {
    let mut sum = 0.0;
    for &v in x {
        sum += v * v;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{l1_penalty, squared_loss, FunctionDescriptor, FunctionKind};

    fn tight_options() -> AdmmOptions {
        AdmmOptions {
            abs_tol: 1e-9,
            rel_tol: 1e-8,
            max_iters: 20_000,
            ..AdmmOptions::default()
        }
    }

    #[test]
    fn solves_diagonal_lasso() {
        // With A = diag(2, 3) the Lasso decouples:
        // x_j = soft(a_j b_j, lambda) / a_j^2.
        let a = CsrMatrix::new(2, 2, vec![0, 1, 2], vec![0, 1], vec![2.0, 3.0]).unwrap();
        let b = [1.0, 1.0];
        let loss = squared_loss(&b);
        let penalty = l1_penalty(2, 1.0);
        let mut solver = AdmmSolver::new(&a, Parallelism::None)
            .unwrap()
            .with_options(tight_options());
        let mut iterate = Iterate::zeros(2, 2);
        let stats = solver.solve(&a, &loss, &penalty, &mut iterate).unwrap();
        assert_eq!(stats.status, EngineStatus::Converged);
        assert!((iterate.x[0] - 0.25).abs() < 1e-6, "x0 = {}", iterate.x[0]);
        assert!((iterate.x[1] - 2.0 / 9.0).abs() < 1e-6, "x1 = {}", iterate.x[1]);
        assert!((iterate.y[0] - 2.0 * iterate.x[0]).abs() < 1e-12);
        assert!((iterate.y[1] - 3.0 * iterate.x[1]).abs() < 1e-12);
    }

    #[test]
    fn large_penalty_gives_exact_zero() {
        let a = CsrMatrix::new(2, 2, vec![0, 1, 2], vec![0, 1], vec![2.0, 3.0]).unwrap();
        let loss = squared_loss(&[1.0, 1.0]);
        let penalty = l1_penalty(2, 5.0);
        let mut solver = AdmmSolver::new(&a, Parallelism::None).unwrap();
        let mut iterate = Iterate::zeros(2, 2);
        let stats = solver.solve(&a, &loss, &penalty, &mut iterate).unwrap();
        assert_eq!(stats.status, EngineStatus::Converged);
        assert_eq!(iterate.x, vec![0.0, 0.0]);
        assert_eq!(iterate.y, vec![0.0, 0.0]);
    }

    #[test]
    fn nonnegative_least_squares() {
        // min (1/2)||x - (1, -1)||^2 s.t. x >= 0  =>  x = (1, 0)
        let a = CsrMatrix::new(2, 2, vec![0, 1, 2], vec![0, 1], vec![1.0, 1.0]).unwrap();
        let loss = squared_loss(&[1.0, -1.0]);
        let penalty = vec![FunctionDescriptor::new(FunctionKind::IndGe0); 2];
        let mut solver = AdmmSolver::new(&a, Parallelism::None)
            .unwrap()
            .with_options(tight_options());
        let mut iterate = Iterate::zeros(2, 2);
        let stats = solver.solve(&a, &loss, &penalty, &mut iterate).unwrap();
        assert_eq!(stats.status, EngineStatus::Converged);
        assert!((iterate.x[0] - 1.0).abs() < 1e-6);
        assert_eq!(iterate.x[1], 0.0);
    }

    #[test]
    fn recovers_after_numerical_failure() {
        let a = CsrMatrix::new(2, 2, vec![0, 1, 2], vec![0, 1], vec![2.0, 3.0]).unwrap();
        let loss = squared_loss(&[1.0, 1.0]);
        let penalty = l1_penalty(2, 1.0);
        let mut solver = AdmmSolver::new(&a, Parallelism::None)
            .unwrap()
            .with_options(tight_options());

        let mut iterate = Iterate {
            x: vec![f64::NAN; 2],
            y: vec![f64::NAN; 2],
        };
        let stats = solver.solve(&a, &loss, &penalty, &mut iterate).unwrap();
        assert_eq!(stats.status, EngineStatus::NumericalFailure);
        assert!(iterate.x.iter().chain(&iterate.y).all(|v| v.is_finite()));
        assert!(solver.x_dual.iter().chain(&solver.y_dual).all(|v| *v == 0.0));

        // The warm state left behind is usable.
        let stats = solver.solve(&a, &loss, &penalty, &mut iterate).unwrap();
        assert_eq!(stats.status, EngineStatus::Converged);
        assert!((iterate.x[0] - 0.25).abs() < 1e-6, "x0 = {}", iterate.x[0]);
        assert!((iterate.x[1] - 2.0 / 9.0).abs() < 1e-6, "x1 = {}", iterate.x[1]);
    }

    #[test]
    fn rejects_mismatched_arguments() {
        let a = CsrMatrix::new(2, 2, vec![0, 1, 2], vec![0, 1], vec![2.0, 3.0]).unwrap();
        let mut solver = AdmmSolver::new(&a, Parallelism::None).unwrap();
        let loss = squared_loss(&[1.0]);
        let penalty = l1_penalty(2, 1.0);
        let mut iterate = Iterate::zeros(2, 2);
        let err = solver.solve(&a, &loss, &penalty, &mut iterate).unwrap_err();
        assert!(matches!(
            err,
            SolveError::DimensionMismatch { what: "loss descriptors", expected: 2, actual: 1 }
        ));

        let other = CsrMatrix::new(2, 2, vec![0, 2, 2], vec![0, 1], vec![1.0, 1.0]).unwrap();
        let loss = squared_loss(&[1.0, 1.0]);
        let err = solver.solve(&other, &loss, &penalty, &mut iterate).unwrap_err();
        assert!(matches!(err, SolveError::PatternMismatch));
    }

    #[test]
    fn rejects_empty_matrix() {
        let a = CsrMatrix::new(0, 2, vec![0], vec![], vec![]).unwrap();
        assert!(matches!(
            AdmmSolver::new(&a, Parallelism::None),
            Err(SolverError::InvalidDimensions { nrows: 0, ncols: 2 })
        ));
    }
}
