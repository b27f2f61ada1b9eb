/// Errors from parsing lmfit's textual problem format,
/// or from turning a parsed problem into a fit.
#[derive(thiserror::Error, Debug)]
#[cfg_attr(not(feature = "unstable-exhaustive"), non_exhaustive)]
pub enum TextualError {
    /// The text didn't match the problem grammar.
    #[error("Could not parse problem: {0}")]
    Parse(String),
    /// The model name isn't one lmfit knows.
    #[error("Unknown model '{name}'")]
    UnknownModel {
        /// What the user wrote.
        name: String,
    },
    /// A data row has a different number of columns to the first row.
    #[error("Data row {row} has {found} columns but the first row has {expected}")]
    InconsistentColumns {
        /// Which row (0-based) was wrong.
        row: usize,
        /// Column count of the first row.
        expected: usize,
        /// Column count of this row.
        found: usize,
    },
    /// Data rows must be `x y` or `x y sigma`.
    #[error("Data rows need 2 or 3 columns, but found {columns}")]
    UnsupportedColumns {
        /// How many columns the rows had.
        columns: usize,
    },
    /// The model has a fixed number of parameters, and the guesses didn't match it.
    #[error("Model {model} takes {expected} parameters, but you supplied {found} guesses")]
    WrongNumberGuesses {
        /// Name of the model.
        model: String,
        /// Number of model parameters.
        expected: usize,
        /// Number of guesses given.
        found: usize,
    },
    /// The fit itself failed.
    #[error(transparent)]
    Fit(#[from] crate::FailureOutcome),
}

/// Errors that could occur when running a Levenberg-Marquardt solve.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[cfg_attr(not(feature = "unstable-exhaustive"), non_exhaustive)]
pub enum LmaError {
    /// The relative convergence tolerance must be strictly positive.
    #[error("Convergence tolerance must be positive, but it was {tolerance}")]
    NonPositiveTolerance {
        /// The rejected tolerance.
        tolerance: f64,
    },
    /// Damping must be a finite, non-negative number.
    #[error("Initial damping must be finite and non-negative, but it was {lambda}")]
    InvalidDamping {
        /// The rejected damping.
        lambda: f64,
    },
    /// The damping factor must be finite and greater than 1,
    /// otherwise increasing the damping never terminates.
    #[error("Damping factor must be finite and greater than 1, but it was {nu}")]
    InvalidDampingFactor {
        /// The rejected factor.
        nu: f64,
    },
    /// Every observation sequence must have the same length.
    #[error("Observation sequence {index} has {found} entries but sequence 0 has {expected}")]
    SequenceLengthMismatch {
        /// Which sequence had the wrong length.
        index: usize,
        /// Length of the first sequence.
        expected: usize,
        /// Length of the offending sequence.
        found: usize,
    },
    /// The mode consumes leading sequences as y (and sigma),
    /// but not enough sequences were supplied.
    #[error("{mode} mode needs at least {needed} observation sequences, but got {found}")]
    MissingSequences {
        /// Which mode was requested.
        mode: crate::Mode,
        /// Minimum number of sequences for that mode.
        needed: usize,
        /// How many were supplied.
        found: usize,
    },
    /// Weighted fits divide by sigma, so it can't be zero.
    #[error("Uncertainty at observation {index} is zero")]
    ZeroUncertainty {
        /// Index of the zero sigma.
        index: usize,
    },
    /// The model can't be called with this many arguments.
    #[error(
        "Model accepts between {min} and {max} arguments, but {arguments} argument sequences and {parameters} parameters were supplied"
    )]
    ArityMismatch {
        /// Model's minimum argument count.
        min: usize,
        /// Model's maximum argument count.
        max: usize,
        /// Number of independent-variable sequences.
        arguments: usize,
        /// Number of parameters being fitted.
        parameters: usize,
    },
    /// There's nothing to fit.
    #[error("Cannot fit a model with no parameters")]
    EmptyParameters,
    /// The damped normal equations could not be Cholesky-factored.
    /// The Jacobian is probably rank-deficient at the current point,
    /// i.e. some parameter (or combination) doesn't affect the residuals.
    #[error("The {size}x{size} normal-equations matrix is not positive definite")]
    SingularSystem {
        /// Number of parameters (rows and columns of the matrix).
        size: usize,
    },
    /// The linear solve produced NaN or infinity.
    #[error("The parameter increment was not finite")]
    NonFiniteStep,
    /// The model returned NaN or infinity at the initial guess.
    #[error("The sum of squares at the initial guess was {sum_squares}")]
    NonFiniteResidual {
        /// What the residual sum came out as.
        sum_squares: f64,
    },
    /// Solver did not find a solution within the allowed number of iterations.
    /// Consider raising the iterations?
    #[error("Could not converge in the allowed number of iterations")]
    DidNotConverge,
    /// An iteration observer asked the solver to stop.
    #[error("The solve was cancelled")]
    Cancelled,
}

impl LmaError {
    /// Did the solver give up, rather than reject its inputs?
    /// These failures still leave a usable best-effort parameter vector.
    pub fn is_convergence_failure(&self) -> bool {
        matches!(self, Self::DidNotConverge | Self::Cancelled)
    }
}
