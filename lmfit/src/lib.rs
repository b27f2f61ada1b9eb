//! Levenberg-Marquardt Fitting.
//! Fits parametric models to data by nonlinear least squares.
//!
//! ```
//! use lmfit::{Config, Observations, models::Line};
//!
//! let x = [0.0, 1.0, 2.0, 3.0];
//! let y = [1.02, 2.99, 5.01, 6.98];
//! let observations = Observations::least_squares(&y, vec![&x]).unwrap();
//! let mut params = [0.0, 0.0];
//! let config = Config::default().with_tolerance(1e-6);
//! let outcome = lmfit::find_min(&Line, &observations, &mut params, &config).unwrap();
//! assert!((params[0] - 2.0).abs() < 0.05);
//! assert!((params[1] - 1.0).abs() < 0.05);
//! assert!(outcome.sum_squares() < 0.02);
//! ```

pub use crate::accumulator::KahanSum;
pub use crate::config::{Config, StallControl};
pub use crate::error::{LmaError, TextualError};
pub use crate::fit::CurveFit;
pub use crate::model::{FnModel, Model};
pub use crate::observations::{Mode, Observations};
pub use crate::solve_outcome::{BestEffort, FailureOutcome, SolveOutcome};
pub use crate::solver::{Control, IterationStats};

/// Compensated summation.
mod accumulator;
mod config;
mod error;
/// Curve fitting with error estimates.
mod fit;
mod model;
/// Ready-made models.
pub mod models;
/// Data to fit models to.
mod observations;
mod solve_outcome;
/// Levenberg-Marquardt solver, using dense matrices.
mod solver;
/// Parser for textual representation of these problems.
pub mod textual;

/// Fit `model` to `observations`, starting from the guess in `params`.
///
/// On success, `params` holds the fitted parameters. If the solver gives up
/// after improving on the guess (see [`LmaError::is_convergence_failure`]),
/// `params` holds the best parameters it found. Otherwise `params` is unchanged.
pub fn find_min<M>(
    model: &M,
    observations: &Observations<'_>,
    params: &mut [f64],
    config: &Config,
) -> Result<SolveOutcome, FailureOutcome>
where
    M: Model + ?Sized,
{
    find_min_with_observer(model, observations, params, config, |_| Control::Continue)
}

/// Like [`find_min`], but calls `observer` after every iteration.
/// The observer can stop the solve early by returning [`Control::Cancel`].
pub fn find_min_with_observer<M, F>(
    model: &M,
    observations: &Observations<'_>,
    params: &mut [f64],
    config: &Config,
    observer: F,
) -> Result<SolveOutcome, FailureOutcome>
where
    M: Model + ?Sized,
    F: FnMut(&IterationStats) -> Control,
{
    let mut problem = solver::Problem::new(model, observations, params.len(), config)?;
    problem.minimize(params, config, observer)
}

/// Sum of squared residuals of `model` at `params`, without fitting anything.
pub fn sum_squares<M>(
    model: &M,
    observations: &Observations<'_>,
    params: &[f64],
) -> Result<f64, LmaError>
where
    M: Model + ?Sized,
{
    let config = Config::default();
    let mut problem = solver::Problem::new(model, observations, params.len(), &config)?;
    Ok(problem.sum_squares(params))
}
