use core::fmt;
use std::time::{Duration, Instant};

use faer_core::Parallelism;

use crate::convergence::{abs_sum, check_stability, Stability};
use crate::engine::{Engine, EngineStatus, Iterate, SolveError};
use crate::function::{l1_penalty, set_penalty_weight, squared_loss, FunctionDescriptor};
use crate::matrix::CsrMatrix;
use crate::report::{emit_line, format_duration, PathReporter, StepReport, TableReporter};
use crate::schedule::{lambda_max, LambdaSchedule};

/// What happens to the iterate between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmStart {
    /// Keep x and y from the previous step.
    Carry,
    /// Zero x and y and clear the engine's warm state before every step.
    Reset,
}

/// What the path does when the engine reports a non-success status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the status on the step and keep going with whatever x the engine left.
    Continue,
    /// Abort the path with [`PathError::SolverFailed`].
    FailFast,
}

/// Options controlling the path.
#[derive(Debug, Clone)]
pub struct PathOptions {
    /// Number of penalty values in the schedule.
    pub num_lambdas: usize,
    /// Last penalty as a fraction of lambda_max.
    pub min_ratio: f64,
    /// Stop once `max_j |x_j - prev_j| < stop_tol * ||x||_1`.
    pub stop_tol: f64,
    /// Evaluate the early-stop test at all.
    pub early_stop: bool,
    pub warm_start: WarmStart,
    pub on_failure: FailurePolicy,
    /// Deadline for the whole path, checked before every step.
    pub time_limit: Option<Duration>,
    /// Parallelism of the early-stop reductions.
    pub parallelism: Parallelism,
    /// Print the step table and elapsed time.
    pub verbose: bool,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            num_lambdas: 100,
            min_ratio: 1e-2,
            stop_tol: 1e-3,
            early_stop: true,
            warm_start: WarmStart::Carry,
            on_failure: FailurePolicy::Continue,
            time_limit: None,
            parallelism: Parallelism::None,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    NotStarted,
    Stepping(usize),
    /// The early-stop test fired after `step`.
    Converged { step: usize },
    /// Every scheduled penalty was solved.
    Exhausted,
    /// lambda_max was not positive; the solution is zero and no step ran.
    Degenerate,
    /// The time limit expired with `completed` steps done.
    TimedOut { completed: usize },
}

impl PathState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::NotStarted | Self::Stepping(_))
    }

    /// Leaves `NotStarted` once lambda_max is known: the first step when a
    /// schedule exists, `Degenerate` otherwise. Other states are unchanged.
    fn begin(self, has_schedule: bool) -> Self {
        match self {
            Self::NotStarted if has_schedule => Self::Stepping(0),
            Self::NotStarted => Self::Degenerate,
            other => other,
        }
    }
}

impl fmt::Display for PathState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Stepping(step) => write!(f, "stepping ({step})"),
            Self::Converged { step } => write!(f, "converged at step {step}"),
            Self::Exhausted => write!(f, "schedule exhausted"),
            Self::Degenerate => write!(f, "degenerate (lambda_max = 0)"),
            Self::TimedOut { completed } => write!(f, "timed out after {completed} steps"),
        }
    }
}

/// One solved point of the path.
#[derive(Debug, Clone)]
pub struct PathStep {
    pub index: usize,
    pub lambda: f64,
    pub x: Vec<f64>,
    pub status: EngineStatus,
    pub iterations: usize,
    /// Comparison against the previous step; `None` on the first step.
    pub stability: Option<Stability>,
}

#[derive(Debug, Clone)]
pub struct PathResult {
    pub state: PathState,
    pub lambda_max: f64,
    pub steps: Vec<PathStep>,
    /// Wall time of the whole path, measured once.
    pub elapsed: Duration,
}

impl PathResult {
    /// Solution of the last computed step.
    pub fn solution(&self) -> Option<&[f64]> {
        self.steps.last().map(|step| step.x.as_slice())
    }

    /// Steps whose engine status was not a success.
    pub fn failed_steps(&self) -> impl Iterator<Item = &PathStep> {
        self.steps.iter().filter(|step| !step.status.is_success())
    }
}

#[derive(Debug)]
pub enum PathError {
    /// An option is out of range.
    InvalidOptions(&'static str),
    /// A vector's length does not match the matrix.
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// An observation is NaN or infinite.
    NonFinite { what: &'static str, index: usize },
    /// The engine rejected its arguments.
    Solve(SolveError),
    /// The engine did not converge and the policy is fail-fast.
    SolverFailed {
        step: usize,
        lambda: f64,
        status: EngineStatus,
    },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOptions(reason) => write!(f, "invalid path options: {reason}"),
            Self::DimensionMismatch {
                what,
                expected,
                actual,
            } => {
                write!(f, "{what} length {actual} does not match expected {expected}")
            }
            Self::NonFinite { what, index } => {
                write!(f, "non-finite entry in {what} at index {index}")
            }
            Self::Solve(err) => write!(f, "solve error: {err}"),
            Self::SolverFailed {
                step,
                lambda,
                status,
            } => {
                write!(f, "engine reported {status} at step {step} (lambda = {lambda:e})")
            }
        }
    }
}

impl std::error::Error for PathError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Solve(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SolveError> for PathError {
    fn from(err: SolveError) -> Self {
        Self::Solve(err)
    }
}

/// Data and solution buffers of one Lasso problem.
///
/// The iterate persists across path steps and across runs; it is the warm start.
#[derive(Debug, Clone)]
pub struct LassoProblem {
    matrix: CsrMatrix,
    b: Vec<f64>,
    iterate: Iterate,
    loss: Vec<FunctionDescriptor>,
    penalty: Vec<FunctionDescriptor>,
}

impl LassoProblem {
    /// `(1/2)||A x - b||^2 + lambda ||x||_1`, starting from `x = 0`.
    pub fn new(matrix: CsrMatrix, b: Vec<f64>) -> Result<Self, PathError> {
        let loss = squared_loss(&b);
        let penalty = l1_penalty(matrix.ncols(), 1.0);
        Self::with_descriptors(matrix, b, loss, penalty)
    }

    /// Same layout with caller-supplied row and column terms.
    ///
    /// The path still treats `b` as the observations for lambda_max and only
    /// rewrites the penalty scales.
    pub fn with_descriptors(
        matrix: CsrMatrix,
        b: Vec<f64>,
        loss: Vec<FunctionDescriptor>,
        penalty: Vec<FunctionDescriptor>,
    ) -> Result<Self, PathError> {
        let checks = [
            ("observations", matrix.nrows(), b.len()),
            ("loss descriptors", matrix.nrows(), loss.len()),
            ("penalty descriptors", matrix.ncols(), penalty.len()),
        ];
        for (what, expected, actual) in checks {
            if expected != actual {
                return Err(PathError::DimensionMismatch {
                    what,
                    expected,
                    actual,
                });
            }
        }
        if let Some(index) = b.iter().position(|v| !v.is_finite()) {
            return Err(PathError::NonFinite {
                what: "observations",
                index,
            });
        }
        let iterate = Iterate::zeros(matrix.nrows(), matrix.ncols());
        Ok(Self {
            matrix,
            b,
            iterate,
            loss,
            penalty,
        })
    }

    pub fn matrix(&self) -> &CsrMatrix {
        &self.matrix
    }

    pub fn observations(&self) -> &[f64] {
        &self.b
    }

    pub fn loss(&self) -> &[FunctionDescriptor] {
        &self.loss
    }

    pub fn penalty(&self) -> &[FunctionDescriptor] {
        &self.penalty
    }

    pub fn iterate(&self) -> &Iterate {
        &self.iterate
    }

    /// Mutable access, e.g. to seed an initial guess.
    pub fn iterate_mut(&mut self) -> &mut Iterate {
        &mut self.iterate
    }

    pub fn x(&self) -> &[f64] {
        &self.iterate.x
    }

    pub fn y(&self) -> &[f64] {
        &self.iterate.y
    }
}

enum ReporterSlot<'a> {
    External(&'a mut dyn PathReporter),
    Local(TableReporter),
    None,
}

impl<'a> ReporterSlot<'a> {
    fn new(reporter: Option<&'a mut dyn PathReporter>, verbose: bool) -> Self {
        match reporter {
            Some(r) => Self::External(r),
            None if verbose => Self::Local(TableReporter::new()),
            None => Self::None,
        }
    }

    fn as_mut(&mut self) -> Option<&mut dyn PathReporter> {
        match self {
            Self::External(r) => Some(*r),
            Self::Local(r) => Some(r),
            Self::None => None,
        }
    }
}

/// Sequential continuation over a geometric penalty schedule.
pub struct PathDriver {
    options: PathOptions,
    previous: Vec<f64>,
}

impl PathDriver {
    pub fn new(options: PathOptions) -> Result<Self, PathError> {
        if options.num_lambdas == 0 {
            return Err(PathError::InvalidOptions("num_lambdas must be at least 1"));
        }
        if !(options.min_ratio > 0.0 && options.min_ratio < 1.0) {
            return Err(PathError::InvalidOptions("min_ratio must lie in (0, 1)"));
        }
        if !(options.stop_tol >= 0.0) || !options.stop_tol.is_finite() {
            return Err(PathError::InvalidOptions("stop_tol must be finite and non-negative"));
        }
        Ok(Self {
            options,
            previous: Vec::new(),
        })
    }

    pub fn options(&self) -> &PathOptions {
        &self.options
    }

    /// Solve `problem` for every penalty of the schedule until the early-stop
    /// test fires, the schedule runs out, or the time limit expires.
    ///
    /// The problem's iterate is used as the starting point and holds the last
    /// solution on return.
    pub fn run<E: Engine + ?Sized>(
        &mut self,
        problem: &mut LassoProblem,
        engine: &mut E,
        reporter: Option<&mut dyn PathReporter>,
    ) -> Result<PathResult, PathError> {
        let start = Instant::now();
        let options = &self.options;
        let mut reporter = ReporterSlot::new(reporter, options.verbose);

        let mut state = PathState::NotStarted;
        let lambda_max = lambda_max(&problem.matrix, &problem.b);
        log::debug!("lambda_max = {lambda_max:.6e}");

        let mut steps = Vec::new();
        let schedule = LambdaSchedule::new(lambda_max, options.num_lambdas, options.min_ratio);
        state = state.begin(schedule.is_some());
        if state == PathState::Degenerate {
            problem.iterate.reset();
        } else {
            // Sentinel: the first comparison can never look stable.
            self.previous.clear();
            self.previous.resize(problem.matrix.ncols(), f64::MAX);
        }

        while let PathState::Stepping(step) = state {
            let Some(schedule) = schedule.as_ref() else {
                break;
            };
            if let Some(limit) = options.time_limit {
                if start.elapsed() >= limit {
                    log::warn!("path time limit {limit:?} reached after {step} steps");
                    state = PathState::TimedOut { completed: step };
                    break;
                }
            }

            let lambda = schedule.lambda(step);
            if options.warm_start == WarmStart::Reset {
                problem.iterate.reset();
                engine.reset();
            }
            set_penalty_weight(&mut problem.penalty, lambda);

            let stats = engine.solve(
                &problem.matrix,
                &problem.loss,
                &problem.penalty,
                &mut problem.iterate,
            )?;

            if !stats.status.is_success() {
                match options.on_failure {
                    FailurePolicy::FailFast => {
                        if let Some(reporter) = reporter.as_mut() {
                            reporter.on_finish();
                        }
                        return Err(PathError::SolverFailed {
                            step,
                            lambda,
                            status: stats.status,
                        });
                    }
                    FailurePolicy::Continue => {
                        log::warn!(
                            "engine reported {} at step {step} (lambda = {lambda:.4e}); continuing",
                            stats.status
                        );
                    }
                }
            }

            let x = &problem.iterate.x;
            let stability = (step > 0)
                .then(|| check_stability(x, &self.previous, options.stop_tol, options.parallelism));
            let stop = options.early_stop && stability.is_some_and(|s| s.stop);

            log::debug!(
                "step {step}: lambda={lambda:.4e} status={} iters={} max_diff={:?}",
                stats.status,
                stats.iterations,
                stability.map(|s| s.max_diff)
            );
            if let Some(reporter) = reporter.as_mut() {
                reporter.on_step(&StepReport {
                    step,
                    lambda,
                    status: stats.status,
                    iterations: stats.iterations,
                    objective: stats.objective,
                    max_diff: stability.map(|s| s.max_diff),
                    abs_sum: match stability {
                        Some(s) => s.abs_sum,
                        None => abs_sum(x, options.parallelism),
                    },
                    nonzeros: x.iter().filter(|v| **v != 0.0).count(),
                });
            }

            steps.push(PathStep {
                index: step,
                lambda,
                x: x.clone(),
                status: stats.status,
                iterations: stats.iterations,
                stability,
            });
            self.previous.copy_from_slice(x);

            state = if stop {
                PathState::Converged { step }
            } else if step + 1 < schedule.len() {
                PathState::Stepping(step + 1)
            } else {
                PathState::Exhausted
            };
        }

        let elapsed = start.elapsed();
        log::debug!("path finished: {state}, {} steps in {elapsed:?}", steps.len());
        if let Some(reporter) = reporter.as_mut() {
            reporter.on_finish();
        }
        if options.verbose {
            emit_line(&format!("path: {state}, time: {}", format_duration(elapsed)));
        }

        Ok(PathResult {
            state,
            lambda_max,
            steps,
            elapsed,
        })
    }
}
