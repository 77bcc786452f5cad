//! Warm-started Lasso regularization paths over sparse data.
//!
//! This crate solves `(1/2) * ||A x - b||^2 + lambda * ||x||_1` for a log-spaced
//! sequence of penalties, from `lambda_max = max_j |(A^T b)_j|` (where `x = 0` is
//! optimal) down to a fraction of it. Each solve starts from the previous
//! solution, and the path stops early once successive solutions stop moving.
//!
//! How it works (high level):
//! - Describe the problem as separable terms: one squared loss per row of `A`,
//!   one absolute-value penalty per column (`FunctionDescriptor`).
//! - Build the penalty schedule in closed form from `lambda_max` (`LambdaSchedule`).
//! - For each penalty, rewrite the penalty scales and call an `Engine`, which
//!   updates the shared `Iterate` in place.
//! - Stop when `max_j |x_j - prev_j| < stop_tol * ||x||_1`.
//!
//! The bundled engine, `AdmmSolver`, is a graph-form ADMM that projects onto
//! `y = A x` through a sparse QR factorization of `[A; I]`. Any other type
//! implementing `Engine` can drive the same path.
//!
//! Calling it:
//! - Build a `CsrMatrix` and wrap it with the observations in a `LassoProblem`.
//! - Create an `AdmmSolver` for the matrix and a `PathDriver` from `PathOptions`.
//! - Call `PathDriver::run` and inspect the `PathResult`.
//!
//! Example:
//! ```rust,no_run
//! use faer_core::Parallelism;
//! use lasso_path::{lasso_instance, AdmmSolver, LassoProblem, PathDriver, PathOptions};
//!
//! let (a, b) = lasso_instance(100, 50, 300, 0).unwrap();
//! let mut engine = AdmmSolver::new(&a, Parallelism::None).unwrap();
//! let mut problem = LassoProblem::new(a, b).unwrap();
//! let mut driver = PathDriver::new(PathOptions {
//!     num_lambdas: 10,
//!     ..PathOptions::default()
//! })
//! .unwrap();
//! let result = driver.run(&mut problem, &mut engine, None).unwrap();
//! assert!(result.steps.len() <= 10);
//! ```

mod admm;
mod convergence;
mod engine;
mod function;
mod generate;
mod matrix;
mod path;
mod report;
mod schedule;

pub use admm::{AdmmOptions, AdmmSolver, SolverError};
pub use convergence::{abs_sum, check_stability, max_abs_diff, Stability};
pub use engine::{check_dimensions, Engine, EngineStats, EngineStatus, Iterate, SolveError};
pub use function::{
    l1_penalty, separable_sum, set_penalty_weight, squared_loss, FunctionDescriptor, FunctionKind,
};
pub use generate::{lasso_instance, random_observations, random_sparse};
pub use matrix::{CsrMatrix, MatrixError};
pub use path::{
    FailurePolicy, LassoProblem, PathDriver, PathError, PathOptions, PathResult, PathState,
    PathStep, WarmStart,
};
pub use report::{PathReporter, StepReport, TableReporter};
pub use schedule::{lambda_max, LambdaSchedule};
