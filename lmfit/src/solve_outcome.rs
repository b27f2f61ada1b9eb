use crate::LmaError;

/// Data from a successful fit.
/// The fitted parameters have already been written back into the caller's buffer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(not(feature = "unstable-exhaustive"), non_exhaustive)]
pub struct SolveOutcome {
    /// Sum of squared residual terms at the solution.
    pub(crate) sum_squares: f64,
    /// How many Levenberg-Marquardt iterations ran.
    pub(crate) iterations: usize,
    /// Damping when the solver stopped.
    pub(crate) lambda: f64,
}

impl SolveOutcome {
    /// Sum of squared residual terms at the solution.
    pub fn sum_squares(&self) -> f64 {
        self.sum_squares
    }

    /// How many Levenberg-Marquardt iterations ran.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Damping when the solver stopped.
    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

/// The best parameters found before a solve gave up.
#[derive(Debug, Clone, PartialEq)]
pub struct BestEffort {
    /// Parameter values. These were also written back to the caller's buffer.
    pub parameters: Vec<f64>,
    /// Sum of squares at those parameters. Always less than at the initial guess.
    pub sum_squares: f64,
}

/// Returned when lmfit could not fit the model.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(not(feature = "unstable-exhaustive"), non_exhaustive)]
pub struct FailureOutcome {
    /// The error that stopped the fit.
    pub error: LmaError,
    /// Iterations completed before stopping.
    pub iterations: usize,
    /// Set if the solver gave up (ran out of iterations, or was cancelled)
    /// after improving on the initial guess.
    pub best: Option<BestEffort>,
}

impl FailureOutcome {
    /// Failed before any iterations ran, e.g. because the inputs were invalid.
    pub(crate) fn rejected(error: LmaError) -> Self {
        Self {
            error,
            iterations: 0,
            best: None,
        }
    }

    /// The error that stopped the fit.
    pub fn error(&self) -> &LmaError {
        &self.error
    }

    /// Iterations completed before stopping.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Best parameters found, if they improved on the initial guess.
    pub fn best(&self) -> Option<&BestEffort> {
        self.best.as_ref()
    }
}

impl From<LmaError> for FailureOutcome {
    fn from(error: LmaError) -> Self {
        Self::rejected(error)
    }
}

impl std::fmt::Display for FailureOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (after {} iterations)", self.error, self.iterations)
    }
}

impl std::error::Error for FailureOutcome {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
