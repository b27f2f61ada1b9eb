use crate::LmaError;

/// How observation sequences turn into residual terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
pub enum Mode {
    /// Every sequence is a model argument, and the residual is the model value itself.
    Normal,
    /// The first sequence is `y`, the residual is `y - model`.
    LeastSquares,
    /// The first sequence is `y`, the second is `sigma`,
    /// and the residual is `(y - model) / sigma`.
    WeightedLeastSquares,
}

impl Mode {
    /// How many leading sequences are consumed as `y` and `sigma`
    /// instead of being passed to the model.
    pub fn leading_sequences(self) -> usize {
        match self {
            Self::Normal => 0,
            Self::LeastSquares => 1,
            Self::WeightedLeastSquares => 2,
        }
    }
}

impl std::fmt::Display for Mode {
    #[mutants::skip]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::LeastSquares => write!(f, "least-squares"),
            Self::WeightedLeastSquares => write!(f, "weighted least-squares"),
        }
    }
}

/// The data a model is fitted to: some independent-variable sequences,
/// and optionally the observed values and their uncertainties.
///
/// Construction checks that every sequence has the same length and that no
/// uncertainty is zero, so the solver never has to.
#[derive(Debug, Clone)]
pub struct Observations<'a> {
    mode: Mode,
    arguments: Vec<&'a [f64]>,
    dependent: Option<&'a [f64]>,
    uncertainty: Option<&'a [f64]>,
    len: usize,
}

impl<'a> Observations<'a> {
    /// Minimise the sum of squared model values.
    /// Every sequence is passed to the model as an argument.
    pub fn normal(arguments: Vec<&'a [f64]>) -> Result<Self, LmaError> {
        Self::build(Mode::Normal, arguments, None, None)
    }

    /// Fit the model to observed values `y`.
    pub fn least_squares(y: &'a [f64], arguments: Vec<&'a [f64]>) -> Result<Self, LmaError> {
        Self::build(Mode::LeastSquares, arguments, Some(y), None)
    }

    /// Fit the model to observed values `y`, each with standard deviation `sigma`.
    pub fn weighted(
        y: &'a [f64],
        sigma: &'a [f64],
        arguments: Vec<&'a [f64]>,
    ) -> Result<Self, LmaError> {
        Self::build(Mode::WeightedLeastSquares, arguments, Some(y), Some(sigma))
    }

    /// Build observations from a flat list of sequences, where the mode decides
    /// whether the first one or two sequences are `y` and `sigma`.
    ///
    /// ```
    /// use lmfit::{Mode, Observations};
    ///
    /// let y = [1.0, 2.0];
    /// let x = [0.0, 1.0];
    /// let obs = Observations::from_sequences(Mode::LeastSquares, &[&y, &x]).unwrap();
    /// assert_eq!(obs.num_arguments(), 1);
    /// ```
    pub fn from_sequences(mode: Mode, sequences: &[&'a [f64]]) -> Result<Self, LmaError> {
        let needed = mode.leading_sequences();
        if sequences.len() < needed {
            return Err(LmaError::MissingSequences {
                mode,
                needed,
                found: sequences.len(),
            });
        }
        let (leading, arguments) = sequences.split_at(needed);
        let arguments = arguments.to_vec();
        match *leading {
            [] => Self::normal(arguments),
            [y] => Self::least_squares(y, arguments),
            [y, sigma] => Self::weighted(y, sigma, arguments),
            _ => unreachable!("a mode consumes at most two leading sequences"),
        }
    }

    fn build(
        mode: Mode,
        arguments: Vec<&'a [f64]>,
        dependent: Option<&'a [f64]>,
        uncertainty: Option<&'a [f64]>,
    ) -> Result<Self, LmaError> {
        // Check lengths in the same order the sequences would be passed
        // as a flat list: y, sigma, then arguments.
        let all = dependent
            .iter()
            .chain(uncertainty.iter())
            .chain(arguments.iter());
        let mut len = None;
        for (index, sequence) in all.enumerate() {
            match len {
                None => len = Some(sequence.len()),
                Some(expected) if expected != sequence.len() => {
                    return Err(LmaError::SequenceLengthMismatch {
                        index,
                        expected,
                        found: sequence.len(),
                    });
                }
                Some(_) => {}
            }
        }
        let Some(len) = len else {
            return Err(LmaError::MissingSequences {
                mode,
                needed: mode.leading_sequences().max(1),
                found: 0,
            });
        };
        if let Some(sigma) = uncertainty
            && let Some(index) = sigma.iter().position(|s| *s == 0.0)
        {
            return Err(LmaError::ZeroUncertainty { index });
        }
        Ok(Self {
            mode,
            arguments,
            dependent,
            uncertainty,
            len,
        })
    }

    /// Which residual convention these observations use.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Number of observations, N.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Are there zero observations?
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of independent-variable sequences passed to the model.
    pub fn num_arguments(&self) -> usize {
        self.arguments.len()
    }

    /// Copy the independent variables of observation `i` into the front of `args`.
    #[inline]
    pub(crate) fn load_arguments(&self, i: usize, args: &mut [f64]) {
        for (slot, sequence) in args.iter_mut().zip(&self.arguments) {
            *slot = sequence[i];
        }
    }

    /// Observed value at `i`. Zero in [`Mode::Normal`], so that
    /// `observed - model` is the (negated) model value.
    #[inline]
    pub(crate) fn observed(&self, i: usize) -> f64 {
        self.dependent.map_or(0.0, |y| y[i])
    }

    /// Uncertainty at `i`. One unless the fit is weighted.
    #[inline]
    pub(crate) fn sigma(&self, i: usize) -> f64 {
        self.uncertainty.map_or(1.0, |sigma| sigma[i])
    }

    /// Weighted residual term at `i`, given the model's value there.
    #[inline]
    pub(crate) fn term(&self, i: usize, model_value: f64) -> f64 {
        (self.observed(i) - model_value) / self.sigma(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_sequences_splits_leading() {
        let y = [1.0, 2.0, 3.0];
        let sigma = [0.5, 0.5, 0.5];
        let x = [0.0, 1.0, 2.0];
        let obs =
            Observations::from_sequences(Mode::WeightedLeastSquares, &[&y, &sigma, &x]).unwrap();
        assert_eq!(obs.mode(), Mode::WeightedLeastSquares);
        assert_eq!(obs.num_arguments(), 1);
        assert_eq!(obs.len(), 3);
        assert_eq!(obs.term(1, 1.0), 2.0);

        let obs = Observations::from_sequences(Mode::Normal, &[&y, &x]).unwrap();
        assert_eq!(obs.num_arguments(), 2);
        // Normal mode's term is the negated model value; only its square matters.
        assert_eq!(obs.term(0, 4.0), -4.0);
    }

    #[test]
    fn mismatched_lengths() {
        let y = [1.0, 2.0, 3.0];
        let x = [0.0, 1.0];
        let err = Observations::least_squares(&y, vec![&x]).unwrap_err();
        assert_eq!(
            err,
            LmaError::SequenceLengthMismatch {
                index: 1,
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn zero_sigma_rejected() {
        let y = [1.0, 2.0];
        let sigma = [0.1, 0.0];
        let x = [0.0, 1.0];
        let err = Observations::weighted(&y, &sigma, vec![&x]).unwrap_err();
        assert_eq!(err, LmaError::ZeroUncertainty { index: 1 });
    }

    #[test]
    fn too_few_sequences() {
        let y = [1.0];
        let err = Observations::from_sequences(Mode::WeightedLeastSquares, &[&y]).unwrap_err();
        assert!(matches!(
            err,
            LmaError::MissingSequences {
                needed: 2,
                found: 1,
                ..
            }
        ));
        assert!(Observations::normal(Vec::new()).is_err());
    }

    #[test]
    fn load_arguments_fills_prefix_only() {
        let a = [1.0, 2.0];
        let b = [3.0, 4.0];
        let obs = Observations::normal(vec![&a, &b]).unwrap();
        let mut args = [0.0, 0.0, 9.0];
        obs.load_arguments(1, &mut args);
        assert_eq!(args, [2.0, 4.0, 9.0]);
    }
}
