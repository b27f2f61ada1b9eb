use faer::{Mat, Side, prelude::Solve};
use tracing::trace;

use crate::{KahanSum, LmaError, Model};

use super::Problem;

/// Singular values of the Jacobian smaller than this, relative to the largest,
/// count as zero.
const RANK_TOLERANCE: f64 = 1e-10;

impl<M: Model + ?Sized> Problem<'_, M> {
    /// Evaluate the model and its Jacobian at every observation,
    /// then build the undamped normal equations
    /// A = JᵀWJ and b = JᵀW(y - f), with W = diag(1/σ²).
    fn assemble(&mut self, params: &[f64]) {
        self.load_params(params);
        let offset = self.param_offset();
        let n = self.observations.len();
        let m = self.num_params;

        for i in 0..n {
            self.observations.load_arguments(i, &mut self.args);
            let value = self.model.value_at(&self.args);
            self.model.jacobian_row(offset, &self.args, &mut self.row);
            for (p, partial) in self.row.iter().enumerate() {
                self.jacobian[(i, p)] = *partial;
            }
            self.residuals[i] = self.observations.observed(i) - value;
        }

        for p in 0..m {
            for q in 0..=p {
                let entry: KahanSum = (0..n)
                    .map(|i| {
                        let sigma = self.observations.sigma(i);
                        self.jacobian[(i, p)] * self.jacobian[(i, q)] / (sigma * sigma)
                    })
                    .collect();
                self.a[(p, q)] = entry.total();
                self.a[(q, p)] = entry.total();
            }
            let rhs: KahanSum = (0..n)
                .map(|i| {
                    let sigma = self.observations.sigma(i);
                    self.jacobian[(i, p)] * self.residuals[i] / (sigma * sigma)
                })
                .collect();
            self.b[p] = rhs.total();
        }
    }

    /// Take one damped Gauss-Newton step from `current`, with damping `lambda`.
    /// Writes the stepped-to parameters into `next` and returns their sum of squares.
    /// A NaN sum of squares is reported as infinity, so it never looks like an improvement.
    pub fn trial_step(
        &mut self,
        current: &[f64],
        lambda: f64,
        next: &mut [f64],
    ) -> Result<f64, LmaError> {
        self.assemble(current);
        if lambda != 0.0 {
            for p in 0..self.num_params {
                self.a[(p, p)] *= 1.0 + lambda;
            }
        }

        let size = self.num_params;
        let llt = self
            .a
            .llt(Side::Lower)
            .map_err(|_| LmaError::SingularSystem { size })?;
        let g = llt.solve(&self.b);
        if g.iter().any(|d| !d.is_finite()) {
            return Err(LmaError::NonFiniteStep);
        }

        for ((next, current), d) in next.iter_mut().zip(current).zip(g.iter()) {
            *next = current + d;
        }
        let sum_squares = self.sum_squares(next);
        trace!(lambda, sum_squares, "trial step");
        if sum_squares.is_nan() {
            Ok(f64::INFINITY)
        } else {
            Ok(sum_squares)
        }
    }

    /// Fail if the Jacobian at `params` is rank-deficient, i.e. some parameter
    /// (or combination of parameters) has no effect on the residuals.
    /// Damped steps can still be taken from such a point, so the driver checks
    /// this once it has converged.
    pub fn check_rank(&mut self, params: &[f64]) -> Result<(), LmaError> {
        self.assemble(params);
        let size = self.num_params;
        let svd = self
            .jacobian
            .svd()
            .map_err(|_| LmaError::SingularSystem { size })?;
        let singular_values = svd.S().column_vector();
        if singular_values.nrows() < size {
            return Err(LmaError::SingularSystem { size });
        }
        let largest = singular_values.iter().copied().fold(0.0, libm::fmax);
        let smallest = singular_values
            .iter()
            .copied()
            .fold(f64::INFINITY, libm::fmin);
        if !(smallest > RANK_TOLERANCE * largest) {
            trace!(smallest, largest, "rank-deficient jacobian");
            return Err(LmaError::SingularSystem { size });
        }
        Ok(())
    }

    /// The undamped JᵀWJ at `params`.
    pub fn normal_matrix(&mut self, params: &[f64]) -> &Mat<f64> {
        self.assemble(params);
        &self.a
    }
}
