use faer::{Mat, Side, prelude::Solve};
use tracing::debug;

use crate::solver::Problem;
use crate::{Config, Control, FailureOutcome, LmaError, Model, Observations, SolveOutcome};

/// How uncertain each observed `y` is.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Uncertainty {
    /// Unknown, so it's estimated from the scatter of the residuals.
    Unknown,
    /// Every point has the same standard deviation.
    Constant(f64),
    /// Each point has its own standard deviation.
    PerPoint,
}

/// A model of one variable, `y = f(x; p)`, fitted to some points,
/// along with estimates of how well-determined the fitted parameters are.
///
/// ```
/// use lmfit::{Config, CurveFit, models::Line};
///
/// let x = [0.0, 1.0, 2.0, 3.0];
/// let y = [1.02, 2.99, 5.01, 6.98];
/// let fit = CurveFit::new(Line, &x, &y, &[0.0, 0.0], &Config::default()).unwrap();
/// assert_eq!(fit.degrees_of_freedom(), 2);
/// assert!((fit.value_at(4.0) - 9.0).abs() < 0.1);
/// ```
#[derive(Debug, Clone)]
pub struct CurveFit<M> {
    model: M,
    parameters: Vec<f64>,
    outcome: SolveOutcome,
    degrees_of_freedom: usize,
    chi_square: f64,
    reduced_chi_square: f64,
    covariance: Mat<f64>,
}

impl<M: Model> CurveFit<M> {
    /// Fit without knowing the uncertainty in `y`.
    /// The parameter covariance is scaled by the residual variance.
    pub fn new(
        model: M,
        x: &[f64],
        y: &[f64],
        guess: &[f64],
        config: &Config,
    ) -> Result<Self, FailureOutcome> {
        let observations = Observations::least_squares(y, vec![x])?;
        Self::fit(model, &observations, Uncertainty::Unknown, guess, config)
    }

    /// Fit where every `y` has the same standard deviation `sigma`.
    pub fn with_sigma(
        model: M,
        x: &[f64],
        y: &[f64],
        sigma: f64,
        guess: &[f64],
        config: &Config,
    ) -> Result<Self, FailureOutcome> {
        if sigma == 0.0 {
            return Err(LmaError::ZeroUncertainty { index: 0 }.into());
        }
        // A constant weight doesn't move the minimum, so fit unweighted and rescale after.
        let observations = Observations::least_squares(y, vec![x])?;
        Self::fit(
            model,
            &observations,
            Uncertainty::Constant(sigma),
            guess,
            config,
        )
    }

    /// Fit where each `y[i]` has its own standard deviation `sigmas[i]`.
    pub fn with_sigmas(
        model: M,
        x: &[f64],
        y: &[f64],
        sigmas: &[f64],
        guess: &[f64],
        config: &Config,
    ) -> Result<Self, FailureOutcome> {
        let observations = Observations::weighted(y, sigmas, vec![x])?;
        Self::fit(model, &observations, Uncertainty::PerPoint, guess, config)
    }

    fn fit(
        model: M,
        observations: &Observations<'_>,
        uncertainty: Uncertainty,
        guess: &[f64],
        config: &Config,
    ) -> Result<Self, FailureOutcome> {
        let m = guess.len();
        let n = observations.len();
        let mut parameters = guess.to_vec();
        let mut problem = Problem::new(&model, observations, m, config)?;
        let outcome = problem.minimize(&mut parameters, config, |_| Control::Continue)?;
        let sum_squares = outcome.sum_squares();

        let (degrees_of_freedom, chi_square, reduced_chi_square, covariance) = if n <= m {
            // Exactly determined (or worse), so there's no residual to estimate errors from.
            (0, 0.0, f64::INFINITY, Mat::zeros(m, m))
        } else {
            let dof = n - m;
            let unscaled = invert(problem.normal_matrix(&parameters)).map_err(|error| {
                FailureOutcome {
                    error,
                    iterations: outcome.iterations(),
                    best: None,
                }
            })?;
            let (chi_square, scale) = match uncertainty {
                Uncertainty::Unknown => (dof as f64, sum_squares / dof as f64),
                Uncertainty::Constant(sigma) => (sum_squares / (sigma * sigma), sigma * sigma),
                Uncertainty::PerPoint => (sum_squares, 1.0),
            };
            let covariance = Mat::from_fn(m, m, |j, k| unscaled[(j, k)] * scale);
            (dof, chi_square, chi_square / dof as f64, covariance)
        };
        debug!(
            sum_squares,
            chi_square, degrees_of_freedom, "computed fit statistics"
        );

        Ok(Self {
            model,
            parameters,
            outcome,
            degrees_of_freedom,
            chi_square,
            reduced_chi_square,
            covariance,
        })
    }

    /// The fitted parameters.
    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    /// Sum of squared (weighted) residuals at the fitted parameters.
    pub fn sum_squares(&self) -> f64 {
        self.outcome.sum_squares()
    }

    /// How many iterations the solver took.
    pub fn iterations(&self) -> usize {
        self.outcome.iterations()
    }

    /// Details of the solve.
    pub fn outcome(&self) -> &SolveOutcome {
        &self.outcome
    }

    /// Number of points minus number of parameters, or zero if there
    /// weren't more points than parameters.
    pub fn degrees_of_freedom(&self) -> usize {
        self.degrees_of_freedom
    }

    /// χ² of the fit. When the uncertainty in `y` wasn't given
    /// it's estimated from the fit, which makes this equal to the degrees of freedom.
    pub fn chi_square(&self) -> f64 {
        self.chi_square
    }

    /// χ² per degree of freedom. Infinite when there are no degrees of freedom.
    pub fn reduced_chi_square(&self) -> f64 {
        self.reduced_chi_square
    }

    /// Estimated covariance of the fitted parameters.
    pub fn covariance(&self) -> &Mat<f64> {
        &self.covariance
    }

    /// One standard deviation of each fitted parameter.
    pub fn parameter_std_errors(&self) -> Vec<f64> {
        (0..self.parameters.len())
            .map(|j| self.covariance[(j, j)].sqrt())
            .collect()
    }

    /// The fitted model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The fitted curve at `x`.
    pub fn value_at(&self, x: f64) -> f64 {
        self.model.value_at(&self.args(x))
    }

    /// Covariance of the fitted curve's values at `x1` and `x2`,
    /// propagated from the parameter covariance.
    pub fn covariance_at(&self, x1: f64, x2: f64) -> f64 {
        let d1 = self.gradient(x1);
        let d2 = self.gradient(x2);
        let mut total = crate::KahanSum::new();
        for (j, a) in d1.iter().enumerate() {
            for (k, b) in d2.iter().enumerate() {
                total.add(self.covariance[(j, k)] * a * b);
            }
        }
        total.total()
    }

    /// Variance of the fitted curve at `x`.
    pub fn variance_at(&self, x: f64) -> f64 {
        self.covariance_at(x, x)
    }

    fn args(&self, x: f64) -> Vec<f64> {
        std::iter::once(x)
            .chain(self.parameters.iter().copied())
            .collect()
    }

    /// Partial derivatives of the curve at `x` with respect to each parameter.
    fn gradient(&self, x: f64) -> Vec<f64> {
        let mut out = vec![0.0; self.parameters.len()];
        self.model.jacobian_row(1, &self.args(x), &mut out);
        out
    }
}

/// Invert a symmetric positive-definite matrix.
fn invert(matrix: &Mat<f64>) -> Result<Mat<f64>, LmaError> {
    let size = matrix.nrows();
    let llt = matrix
        .llt(Side::Lower)
        .map_err(|_| LmaError::SingularSystem { size })?;
    Ok(llt.solve(Mat::<f64>::identity(size, size)))
}
