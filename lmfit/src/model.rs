/// A real-valued function of some independent variables followed by some parameters.
///
/// The solver calls it with a single argument slice: first the independent
/// variables for one observation, then the parameters being fitted. For example
/// a line `a*x + b` is called as `value_at(&[x, a, b])`.
pub trait Model {
    /// Smallest number of arguments (variables plus parameters) this model accepts.
    fn min_arity(&self) -> usize;

    /// Largest number of arguments (variables plus parameters) this model accepts.
    fn max_arity(&self) -> usize;

    /// Evaluate the model.
    fn value_at(&self, args: &[f64]) -> f64;

    /// Partial derivatives of the model with respect to `args[offset..]`.
    /// Writes `args.len() - offset` values into `out`.
    ///
    /// The solver always passes `offset` = number of independent variables,
    /// so this is one row of the Jacobian with respect to the parameters.
    fn jacobian_row(&self, offset: usize, args: &[f64], out: &mut [f64]);

    /// Can this model be called with `arity` arguments?
    fn accepts_arity(&self, arity: usize) -> bool {
        self.min_arity() <= arity && arity <= self.max_arity()
    }
}

impl<M: Model + ?Sized> Model for &M {
    fn min_arity(&self) -> usize {
        (**self).min_arity()
    }

    fn max_arity(&self) -> usize {
        (**self).max_arity()
    }

    fn value_at(&self, args: &[f64]) -> f64 {
        (**self).value_at(args)
    }

    fn jacobian_row(&self, offset: usize, args: &[f64], out: &mut [f64]) {
        (**self).jacobian_row(offset, args, out);
    }
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn min_arity(&self) -> usize {
        (**self).min_arity()
    }

    fn max_arity(&self) -> usize {
        (**self).max_arity()
    }

    fn value_at(&self, args: &[f64]) -> f64 {
        (**self).value_at(args)
    }

    fn jacobian_row(&self, offset: usize, args: &[f64], out: &mut [f64]) {
        (**self).jacobian_row(offset, args, out);
    }
}

/// Adapts a pair of closures into a [`Model`].
///
/// `value` evaluates the function, `partial(i, args)` gives the derivative with
/// respect to `args[i]`. Use this when the derivatives are known analytically
/// but writing a whole type for the model isn't worth it.
///
/// ```
/// use lmfit::{FnModel, Model};
///
/// // y = a * x^2, called as [x, a]
/// let model = FnModel::new(
///     2,
///     |args: &[f64]| args[1] * args[0] * args[0],
///     |i: usize, args: &[f64]| match i {
///         0 => 2.0 * args[1] * args[0],
///         _ => args[0] * args[0],
///     },
/// );
/// assert_eq!(model.value_at(&[3.0, 2.0]), 18.0);
/// ```
pub struct FnModel<F, G> {
    min_arity: usize,
    max_arity: usize,
    value: F,
    partial: G,
}

impl<F, G> FnModel<F, G>
where
    F: Fn(&[f64]) -> f64,
    G: Fn(usize, &[f64]) -> f64,
{
    /// A model that takes exactly `arity` arguments.
    pub fn new(arity: usize, value: F, partial: G) -> Self {
        Self::with_arity_range(arity, arity, value, partial)
    }

    /// A model that takes anywhere from `min_arity` to `max_arity` arguments.
    pub fn with_arity_range(min_arity: usize, max_arity: usize, value: F, partial: G) -> Self {
        Self {
            min_arity,
            max_arity,
            value,
            partial,
        }
    }
}

impl<F, G> Model for FnModel<F, G>
where
    F: Fn(&[f64]) -> f64,
    G: Fn(usize, &[f64]) -> f64,
{
    fn min_arity(&self) -> usize {
        self.min_arity
    }

    fn max_arity(&self) -> usize {
        self.max_arity
    }

    fn value_at(&self, args: &[f64]) -> f64 {
        (self.value)(args)
    }

    fn jacobian_row(&self, offset: usize, args: &[f64], out: &mut [f64]) {
        for (k, partial) in out.iter_mut().enumerate() {
            *partial = (self.partial)(offset + k, args);
        }
    }
}

impl<F, G> std::fmt::Debug for FnModel<F, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnModel")
            .field("min_arity", &self.min_arity)
            .field("max_arity", &self.max_arity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_model() -> FnModel<impl Fn(&[f64]) -> f64, impl Fn(usize, &[f64]) -> f64> {
        FnModel::new(
            2,
            |args: &[f64]| args[1] * args[0] * args[0],
            |i: usize, args: &[f64]| match i {
                0 => 2.0 * args[1] * args[0],
                _ => args[0] * args[0],
            },
        )
    }

    #[test]
    fn jacobian_row_respects_offset() {
        let model = square_model();
        let mut row = [0.0];
        model.jacobian_row(1, &[3.0, 2.0], &mut row);
        assert_eq!(row, [9.0]);

        let mut full = [0.0; 2];
        model.jacobian_row(0, &[3.0, 2.0], &mut full);
        assert_eq!(full, [12.0, 9.0]);
    }

    #[test]
    fn arity() {
        let model = square_model();
        assert!(model.accepts_arity(2));
        assert!(!model.accepts_arity(1));
        assert!(!model.accepts_arity(3));
        // Works through references and boxes too.
        let boxed: Box<dyn Model> = Box::new(square_model());
        assert!(boxed.accepts_arity(2));
        let by_ref: &dyn Model = &model;
        assert_eq!(by_ref.value_at(&[1.0, 4.0]), 4.0);
    }
}
