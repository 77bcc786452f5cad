use core::fmt;

use crate::function::FunctionDescriptor;
use crate::matrix::CsrMatrix;

/// Primal state `(x, y)` handed to an engine.
///
/// On entry to [`Engine::solve`] it is the initial guess; on return it holds the
/// engine's final state with `y = A x`. Reusing the same `Iterate` across calls
/// is how a path warm-starts without copying the solution vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Iterate {
    /// Coefficients, one per matrix column.
    pub x: Vec<f64>,
    /// Fitted values, one per matrix row.
    pub y: Vec<f64>,
}

impl Iterate {
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            x: vec![0.0; ncols],
            y: vec![0.0; nrows],
        }
    }

    /// Zeroes both vectors in place.
    pub fn reset(&mut self) {
        self.x.fill(0.0);
        self.y.fill(0.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Converged,
    MaxIterations,
    NumericalFailure,
}

impl EngineStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Converged)
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Converged => "converged",
            Self::MaxIterations => "max-iters",
            Self::NumericalFailure => "numerical-failure",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct EngineStats {
    pub status: EngineStatus,
    pub iterations: usize,
    pub objective: f64,
    pub primal_residual: f64,
    pub dual_residual: f64,
}

/// Errors specific to a solve call.
#[derive(Debug, Clone)]
pub enum SolveError {
    /// An argument's length does not match the dimensions the engine was set up for.
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The matrix sparsity differs from the one the engine was set up for.
    PatternMismatch,
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch {
                what,
                expected,
                actual,
            } => {
                write!(f, "{what} length {actual} does not match expected {expected}")
            }
            Self::PatternMismatch => {
                write!(f, "matrix sparsity differs from the one the engine was set up for")
            }
        }
    }
}

impl std::error::Error for SolveError {}

/// Convex engine for `minimize sum_i f_i(y_i) + sum_j g_j(x_j)  s.t.  y = A x`.
///
/// `loss` holds one descriptor per row of `matrix` (the `f_i`), `penalty` one per
/// column (the `g_j`). The call blocks until `iterate` is fully resolved. An engine
/// may use the incoming iterate to shorten the solve but must not rely on it.
/// Any setup tied to the matrix structure is the engine's own business.
pub trait Engine {
    fn solve(
        &mut self,
        matrix: &CsrMatrix,
        loss: &[FunctionDescriptor],
        penalty: &[FunctionDescriptor],
        iterate: &mut Iterate,
    ) -> Result<EngineStats, SolveError>;

    /// Discards any warm state kept between calls; default does nothing.
    fn reset(&mut self) {}
}

impl<E: Engine + ?Sized> Engine for &mut E {
    fn solve(
        &mut self,
        matrix: &CsrMatrix,
        loss: &[FunctionDescriptor],
        penalty: &[FunctionDescriptor],
        iterate: &mut Iterate,
    ) -> Result<EngineStats, SolveError> {
        (**self).solve(matrix, loss, penalty, iterate)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Checks that `loss`, `penalty` and `iterate` match the shape of `matrix`.
pub fn check_dimensions(
    matrix: &CsrMatrix,
    loss: &[FunctionDescriptor],
    penalty: &[FunctionDescriptor],
    iterate: &Iterate,
) -> Result<(), SolveError> {
    let checks = [
        ("loss descriptors", matrix.nrows(), loss.len()),
        ("penalty descriptors", matrix.ncols(), penalty.len()),
        ("x", matrix.ncols(), iterate.x.len()),
        ("y", matrix.nrows(), iterate.y.len()),
    ];
    for (what, expected, actual) in checks {
        if expected != actual {
            return Err(SolveError::DimensionMismatch {
                what,
                expected,
                actual,
            });
        }
    }
    Ok(())
}
