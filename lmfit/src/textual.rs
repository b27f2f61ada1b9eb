mod parser;

use std::str::FromStr;

use winnow::Parser;

use crate::models::{BuiltinModel, Polynomial};
use crate::{Config, CurveFit, TextualError};

/// A curve-fitting problem: which model, where to start, and the data.
///
/// ```
/// use lmfit::textual::Problem;
///
/// let problem: Problem = "\
/// ## model
/// line
///
/// ## guesses
/// 0, 0
///
/// ## data
/// 0 1
/// 1 3
/// 2 5
/// "
/// .parse()
/// .unwrap();
/// let fit = problem.fit(&Default::default()).unwrap();
/// assert!((fit.parameters()[0] - 2.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    /// Model to fit.
    pub model: BuiltinModel,
    /// Starting value for each of the model's parameters.
    pub guesses: Vec<f64>,
    /// Independent variable, first data column.
    pub x: Vec<f64>,
    /// Observed values, second data column.
    pub y: Vec<f64>,
    /// Uncertainty in each `y`, if the data had a third column.
    pub sigma: Option<Vec<f64>>,
}

/// Problem as written, before checking it makes sense.
#[derive(Debug)]
struct RawProblem {
    model: ModelName,
    guesses: Vec<f64>,
    rows: Vec<Vec<f64>>,
}

#[derive(Debug)]
struct ModelName {
    name: String,
    degree: Option<usize>,
}

impl ModelName {
    fn resolve(self) -> Result<BuiltinModel, TextualError> {
        match (self.name.as_str(), self.degree) {
            ("line", None) => Ok(BuiltinModel::Line),
            ("exponential", None) => Ok(BuiltinModel::ExponentialDecay),
            ("polynomial", Some(degree)) => Ok(BuiltinModel::Polynomial(Polynomial::new(degree))),
            (_, None) => Err(TextualError::UnknownModel {
                name: self.name.clone(),
            }),
            (name, Some(degree)) => Err(TextualError::UnknownModel {
                name: format!("{name}({degree})"),
            }),
        }
    }
}

impl FromStr for Problem {
    type Err = TextualError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = RawProblem::parse
            .parse(s)
            .map_err(|e| TextualError::Parse(e.to_string()))?;
        raw.validate()
    }
}

impl RawProblem {
    fn validate(self) -> Result<Problem, TextualError> {
        let model = self.model.resolve()?;
        if self.guesses.len() != model.num_parameters() {
            return Err(TextualError::WrongNumberGuesses {
                model: model.to_string(),
                expected: model.num_parameters(),
                found: self.guesses.len(),
            });
        }

        let expected = self.rows.first().map(Vec::len).unwrap_or_default();
        if let Some((row, found)) = self
            .rows
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|(_, found)| *found != expected)
        {
            return Err(TextualError::InconsistentColumns {
                row,
                expected,
                found,
            });
        }
        let column = |c: usize| self.rows.iter().map(|row| row[c]).collect::<Vec<_>>();
        let sigma = match expected {
            2 => None,
            3 => Some(column(2)),
            columns => return Err(TextualError::UnsupportedColumns { columns }),
        };
        Ok(Problem {
            model,
            guesses: self.guesses,
            x: column(0),
            y: column(1),
            sigma,
        })
    }
}

impl Problem {
    /// Fit the model to the data.
    /// With a sigma column this is a weighted fit, otherwise unweighted.
    pub fn fit(&self, config: &Config) -> Result<CurveFit<BuiltinModel>, TextualError> {
        let fit = match &self.sigma {
            Some(sigma) => {
                CurveFit::with_sigmas(self.model, &self.x, &self.y, sigma, &self.guesses, config)
            }
            None => CurveFit::new(self.model, &self.x, &self.y, &self.guesses, config),
        }?;
        Ok(fit)
    }

    /// Number of data points.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Does the problem have no data? Never true for a parsed problem.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmaError;
    use crate::tests::assert_nearly_eq;

    #[test]
    fn weighted_exponential() {
        let problem: Problem = "\
# model
exponential

# guesses
1.0, 1.0

# data
0.0 4.0 0.1
0.5 3.60653 0.1
1.0 3.36788 0.1
1.5 3.22313 0.1
2.0 3.13534 0.1
"
        .parse()
        .unwrap();
        assert_eq!(problem.model, BuiltinModel::ExponentialDecay);
        assert_eq!(problem.len(), 5);
        assert_eq!(problem.sigma.as_deref(), Some(&[0.1; 5][..]));
        let fit = problem
            .fit(&Config::default().with_tolerance(1e-12))
            .unwrap();
        assert!((fit.parameters()[0] - 3.0).abs() < 1e-3);
        assert!((fit.parameters()[1] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn polynomial() {
        let problem: Problem = "# model\npolynomial(2)\n# guesses\n0,0,0\n# data\n0 1\n1 2\n2 5\n3 10"
            .parse()
            .unwrap();
        assert_eq!(problem.model, BuiltinModel::Polynomial(Polynomial::new(2)));
        assert!(problem.sigma.is_none());
        let fit = problem
            .fit(&Config::default().with_tolerance(1e-10))
            .unwrap();
        // 1 + x^2
        assert_nearly_eq(fit.parameters()[0], 1.0);
        assert_nearly_eq(fit.parameters()[1], 0.0);
        assert_nearly_eq(fit.parameters()[2], 1.0);
    }

    #[test]
    fn unknown_model() {
        let err = "# model\ncubic\n# guesses\n0\n# data\n0 1\n"
            .parse::<Problem>()
            .unwrap_err();
        assert!(matches!(err, TextualError::UnknownModel { name } if name == "cubic"));
        let err = "# model\nline(2)\n# guesses\n0\n# data\n0 1\n"
            .parse::<Problem>()
            .unwrap_err();
        assert!(matches!(err, TextualError::UnknownModel { name } if name == "line(2)"));
    }

    #[test]
    fn wrong_number_of_guesses() {
        let err = "# model\nline\n# guesses\n0\n# data\n0 1\n"
            .parse::<Problem>()
            .unwrap_err();
        assert!(matches!(
            err,
            TextualError::WrongNumberGuesses {
                expected: 2,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn bad_columns() {
        let err = "# model\nline\n# guesses\n0, 0\n# data\n0 1\n1 2 3\n"
            .parse::<Problem>()
            .unwrap_err();
        assert!(matches!(
            err,
            TextualError::InconsistentColumns {
                row: 1,
                expected: 2,
                found: 3
            }
        ));
        let err = "# model\nline\n# guesses\n0, 0\n# data\n0\n1\n"
            .parse::<Problem>()
            .unwrap_err();
        assert!(matches!(err, TextualError::UnsupportedColumns { columns: 1 }));
    }

    #[test]
    fn syntax_error() {
        let err = "# guesses\n0, 0\n".parse::<Problem>().unwrap_err();
        assert!(matches!(err, TextualError::Parse(_)));
    }

    #[test]
    fn fit_failure_is_reported() {
        // Every x is the same, so the slope is undetermined.
        let problem: Problem = "# model\nline\n# guesses\n1, 1\n# data\n0 1\n0 2\n0 3\n"
            .parse()
            .unwrap();
        let err = problem.fit(&Config::default()).unwrap_err();
        let TextualError::Fit(failure) = err else {
            panic!("expected a fit failure, got {err}");
        };
        assert_eq!(failure.error, LmaError::SingularSystem { size: 2 });
    }
}
