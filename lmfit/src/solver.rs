use faer::{Col, Mat};

use crate::{Config, LmaError, Model, Observations};

mod lma;
mod residual;
mod step;

pub use lma::{Control, IterationStats};

/// A model paired with the data it's being fitted to, plus all the scratch
/// space a solve needs. Allocated once per solve; every trial step overwrites
/// the scratch buffers completely before reading them.
pub(crate) struct Problem<'a, M: ?Sized> {
    model: &'a M,
    observations: &'a Observations<'a>,
    /// Number of parameters being fitted, M.
    num_params: usize,
    /// What actually gets passed to the model: the independent variables for
    /// one observation, followed by the parameters.
    args: Vec<f64>,
    /// One Jacobian row, as written by the model.
    row: Vec<f64>,
    /// N×M. Row i holds the partial derivatives of the model at observation i.
    jacobian: Mat<f64>,
    /// Unweighted residual at each observation (`observed - model`).
    residuals: Vec<f64>,
    /// Damped normal-equations matrix, M×M.
    a: Mat<f64>,
    /// Normal-equations right-hand side, length M.
    b: Col<f64>,
}

impl<'a, M: Model + ?Sized> Problem<'a, M> {
    /// Check the model, data and config agree with each other, and allocate scratch space.
    pub fn new(
        model: &'a M,
        observations: &'a Observations<'a>,
        num_params: usize,
        config: &Config,
    ) -> Result<Self, LmaError> {
        // NaN fails every comparison, so check for the valid case and negate.
        if !(config.tolerance > 0.0) {
            return Err(LmaError::NonPositiveTolerance {
                tolerance: config.tolerance,
            });
        }
        if !(config.lambda >= 0.0 && config.lambda.is_finite()) {
            return Err(LmaError::InvalidDamping {
                lambda: config.lambda,
            });
        }
        if !(config.nu > 1.0 && config.nu.is_finite()) {
            return Err(LmaError::InvalidDampingFactor { nu: config.nu });
        }
        if num_params == 0 {
            return Err(LmaError::EmptyParameters);
        }
        let num_args = observations.num_arguments();
        if !model.accepts_arity(num_args + num_params) {
            return Err(LmaError::ArityMismatch {
                min: model.min_arity(),
                max: model.max_arity(),
                arguments: num_args,
                parameters: num_params,
            });
        }

        let n = observations.len();
        Ok(Self {
            model,
            observations,
            num_params,
            args: vec![0.0; num_args + num_params],
            row: vec![0.0; num_params],
            jacobian: Mat::zeros(n, num_params),
            residuals: vec![0.0; n],
            a: Mat::zeros(num_params, num_params),
            b: Col::zeros(num_params),
        })
    }

    /// Index of the first parameter within the model's arguments.
    fn param_offset(&self) -> usize {
        self.observations.num_arguments()
    }

    /// Put these parameters after the independent variables in the argument buffer.
    fn load_params(&mut self, params: &[f64]) {
        debug_assert_eq!(
            params.len(),
            self.num_params,
            "Expected {} parameters but got {}",
            self.num_params,
            params.len()
        );
        let offset = self.param_offset();
        self.args[offset..].copy_from_slice(params);
    }
}
