use crate::{KahanSum, Model};

use super::Problem;

impl<M: Model + ?Sized> Problem<'_, M> {
    /// Sum of squared residual terms for these parameters.
    /// NaN if the model produced NaN anywhere.
    pub fn sum_squares(&mut self, params: &[f64]) -> f64 {
        self.load_params(params);
        let mut sum = KahanSum::new();
        for i in 0..self.observations.len() {
            self.observations.load_arguments(i, &mut self.args);
            let term = self
                .observations
                .term(i, self.model.value_at(&self.args));
            sum.add(term * term);
        }
        sum.total()
    }
}
