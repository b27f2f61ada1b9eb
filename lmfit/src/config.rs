/// Settings for a Levenberg-Marquardt solve.
/// Read-only during a solve, so one config can be reused for many.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
pub struct Config {
    /// Initial damping λ. Larger values take shorter, gradient-descent-like
    /// steps; zero is pure Gauss-Newton.
    pub lambda: f64,
    /// Factor λ is multiplied or divided by when adapting the damping.
    /// Conventionally greater than 1.
    pub nu: f64,
    /// Stop once an iteration improves the sum of squares by less than
    /// this fraction of it. Must be positive.
    pub tolerance: f64,
    /// Give up after this many iterations. `None` or `Some(0)` means no limit.
    pub max_iterations: Option<usize>,
    /// When to stop retrying ever-larger damping at a (near-)optimal point.
    pub stall: StallControl,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lambda: 5.0,
            nu: 1.3,
            tolerance: 1e-4,
            max_iterations: None,
            stall: StallControl::default(),
        }
    }
}

impl Config {
    /// Set the initial damping.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Set the damping adjustment factor.
    pub fn with_nu(mut self, nu: f64) -> Self {
        self.nu = nu;
        self
    }

    /// Set the relative convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Limit the number of iterations. Zero means no limit.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = (max_iterations > 0).then_some(max_iterations);
        self
    }

    /// Replace the stall detector's constants.
    pub fn with_stall(mut self, stall: StallControl) -> Self {
        self.stall = stall;
        self
    }
}

/// Constants for the solver's handling of iterations where neither trial step
/// improves the fit. These were tuned by hand, not derived.
///
/// When both trial steps are worse, the solver multiplies λ by ν until a step
/// improves. At a point that's already optimal to floating-point precision no
/// step ever improves, so the retries are bounded: once λ passes
/// `retry_count_lambda` every retry is counted, and once λ passes
/// `retry_break_lambda` with more than `max_retries` counted, the solver stops
/// as soon as a retry does worse than the previous one.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
pub struct StallControl {
    /// Every this-many "both steps worse" iterations, also try an undamped
    /// (λ = 0) step. Zero disables the probe.
    pub probe_interval: usize,
    /// Retries only count once λ exceeds this.
    pub retry_count_lambda: f64,
    /// Retries can only stop once λ exceeds this.
    pub retry_break_lambda: f64,
    /// Counted retries needed before the retries can stop.
    pub max_retries: usize,
    /// Damping to restart from when retrying with λ = 0,
    /// since multiplying zero by ν would never increase it.
    pub restart_lambda: f64,
}

impl Default for StallControl {
    fn default() -> Self {
        Self {
            probe_interval: 20,
            retry_count_lambda: 10.0,
            retry_break_lambda: 20.0,
            max_retries: 20,
            restart_lambda: 1e-3,
        }
    }
}
