//! Ready-made models of one independent variable `x`.
//! Each is called as `[x, p0, p1, ...]`.

use crate::Model;

/// `a*x + b`, called as `[x, a, b]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Line;

impl Model for Line {
    fn min_arity(&self) -> usize {
        3
    }

    fn max_arity(&self) -> usize {
        3
    }

    fn value_at(&self, args: &[f64]) -> f64 {
        let [x, a, b] = [args[0], args[1], args[2]];
        a * x + b
    }

    fn jacobian_row(&self, offset: usize, args: &[f64], out: &mut [f64]) {
        let [x, a, _b] = [args[0], args[1], args[2]];
        for (k, partial) in out.iter_mut().enumerate() {
            *partial = match offset + k {
                0 => a,
                1 => x,
                _ => 1.0,
            };
        }
    }
}

/// `p0 + p1*x + p2*x^2 + ... + pd*x^d`, called as `[x, p0, ..., pd]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Polynomial {
    degree: usize,
}

impl Polynomial {
    /// Polynomial with `degree + 1` coefficients.
    pub fn new(degree: usize) -> Self {
        Self { degree }
    }

    /// Highest power of `x`.
    pub fn degree(&self) -> usize {
        self.degree
    }
}

impl Model for Polynomial {
    fn min_arity(&self) -> usize {
        self.degree + 2
    }

    fn max_arity(&self) -> usize {
        self.degree + 2
    }

    fn value_at(&self, args: &[f64]) -> f64 {
        let x = args[0];
        // Horner's rule.
        args[1..]
            .iter()
            .rev()
            .fold(0.0, |acc, coefficient| acc * x + coefficient)
    }

    fn jacobian_row(&self, offset: usize, args: &[f64], out: &mut [f64]) {
        let x = args[0];
        for (k, partial) in out.iter_mut().enumerate() {
            let index = offset + k;
            *partial = if index == 0 {
                args[2..]
                    .iter()
                    .enumerate()
                    .rev()
                    .fold(0.0, |acc, (power, coefficient)| {
                        acc * x + (power + 1) as f64 * coefficient
                    })
            } else {
                x.powi((index - 1) as i32)
            };
        }
    }
}

/// `alpha + exp(-beta*x)`, called as `[x, alpha, beta]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExponentialDecay;

impl Model for ExponentialDecay {
    fn min_arity(&self) -> usize {
        3
    }

    fn max_arity(&self) -> usize {
        3
    }

    fn value_at(&self, args: &[f64]) -> f64 {
        let [x, alpha, beta] = [args[0], args[1], args[2]];
        alpha + libm::exp(-beta * x)
    }

    fn jacobian_row(&self, offset: usize, args: &[f64], out: &mut [f64]) {
        let [x, _alpha, beta] = [args[0], args[1], args[2]];
        let decay = libm::exp(-beta * x);
        for (k, partial) in out.iter_mut().enumerate() {
            *partial = match offset + k {
                0 => -beta * decay,
                1 => 1.0,
                _ => -x * decay,
            };
        }
    }
}

/// Any of the built-in models, chosen at runtime (e.g. by the textual format).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuiltinModel {
    /// See [`Line`].
    Line,
    /// See [`Polynomial`].
    Polynomial(Polynomial),
    /// See [`ExponentialDecay`].
    ExponentialDecay,
}

impl BuiltinModel {
    /// How many parameters the model fits, not counting `x`.
    pub fn num_parameters(&self) -> usize {
        self.min_arity() - 1
    }

    /// Conventional name for each parameter, in order.
    pub fn parameter_names(&self) -> Vec<String> {
        match self {
            Self::Line => vec!["a".to_owned(), "b".to_owned()],
            Self::Polynomial(p) => (0..=p.degree()).map(|i| format!("p{i}")).collect(),
            Self::ExponentialDecay => vec!["alpha".to_owned(), "beta".to_owned()],
        }
    }

    fn as_model(&self) -> &dyn Model {
        match self {
            Self::Line => &Line,
            Self::Polynomial(p) => p,
            Self::ExponentialDecay => &ExponentialDecay,
        }
    }
}

impl std::fmt::Display for BuiltinModel {
    #[mutants::skip]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Line => write!(f, "line"),
            Self::Polynomial(p) => write!(f, "polynomial({})", p.degree()),
            Self::ExponentialDecay => write!(f, "exponential"),
        }
    }
}

impl Model for BuiltinModel {
    fn min_arity(&self) -> usize {
        self.as_model().min_arity()
    }

    fn max_arity(&self) -> usize {
        self.as_model().max_arity()
    }

    fn value_at(&self, args: &[f64]) -> f64 {
        self.as_model().value_at(args)
    }

    fn jacobian_row(&self, offset: usize, args: &[f64], out: &mut [f64]) {
        self.as_model().jacobian_row(offset, args, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::assert_nearly_eq;

    /// Compare each analytic partial derivative to a central difference.
    fn check_derivatives(model: &dyn Model, args: &[f64]) {
        let mut analytic = vec![0.0; args.len()];
        model.jacobian_row(0, args, &mut analytic);
        let h = 1e-6;
        for i in 0..args.len() {
            let mut up = args.to_vec();
            let mut down = args.to_vec();
            up[i] += h;
            down[i] -= h;
            let numeric = (model.value_at(&up) - model.value_at(&down)) / (2.0 * h);
            assert!(
                (numeric - analytic[i]).abs() < 1e-5,
                "partial {i}: analytic {} vs numeric {numeric}",
                analytic[i]
            );
        }
    }

    #[test]
    fn line() {
        assert_nearly_eq(Line.value_at(&[2.0, 3.0, 1.0]), 7.0);
        check_derivatives(&Line, &[2.0, 3.0, 1.0]);
    }

    #[test]
    fn polynomial() {
        // 10 + 2x + 3x^2 at x = 2
        let p = Polynomial::new(2);
        assert_nearly_eq(p.value_at(&[2.0, 10.0, 2.0, 3.0]), 26.0);
        check_derivatives(&p, &[1.5, 10.0, 2.0, 3.0]);
        let mut params_only = [0.0; 3];
        p.jacobian_row(1, &[2.0, 10.0, 2.0, 3.0], &mut params_only);
        assert_eq!(params_only, [1.0, 2.0, 4.0]);
    }

    #[test]
    fn exponential() {
        let args = [0.8, 10.0, 0.5];
        assert_nearly_eq(ExponentialDecay.value_at(&args), 10.0 + (-0.4f64).exp());
        check_derivatives(&ExponentialDecay, &args);
    }

    #[test]
    fn builtin_dispatch() {
        let m = BuiltinModel::Polynomial(Polynomial::new(3));
        assert_eq!(m.num_parameters(), 4);
        assert_eq!(m.to_string(), "polynomial(3)");
        assert_eq!(BuiltinModel::Line.num_parameters(), 2);
        assert_eq!(BuiltinModel::ExponentialDecay.to_string(), "exponential");
        assert_eq!(m.parameter_names(), ["p0", "p1", "p2", "p3"]);
        assert_eq!(BuiltinModel::Line.parameter_names().len(), 2);
        check_derivatives(&m, &[0.5, 1.0, -2.0, 0.25, 4.0]);
    }
}
