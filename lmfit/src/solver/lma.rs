use tracing::{debug, trace};

use crate::{BestEffort, Config, FailureOutcome, LmaError, Model, SolveOutcome};

use super::Problem;

/// Progress report, passed to the observer after every iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IterationStats {
    /// 1-based number of the iteration that just finished.
    pub iteration: usize,
    /// Sum of squares at the accepted parameters.
    pub sum_squares: f64,
    /// Damping the next iteration will start from.
    pub lambda: f64,
}

/// Returned by an iteration observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// Keep iterating.
    Continue,
    /// Stop now, failing with [`LmaError::Cancelled`].
    Cancel,
}

/// Everything the driver changes between iterations.
struct State {
    /// Accepted parameters.
    current: Vec<f64>,
    /// Sum of squares at `current`.
    sum_squares: f64,
    /// Step computed with damping λ.
    trial: Vec<f64>,
    /// Step computed with damping λ/ν.
    relaxed: Vec<f64>,
    /// Undamped step, tried while stalled.
    probe: Vec<f64>,
    lambda: f64,
    iterations: usize,
    /// Iterations where neither trial improved, and the probe didn't either.
    stalls: usize,
}

impl State {
    fn accept_trial(&mut self, sum_squares: f64) {
        std::mem::swap(&mut self.current, &mut self.trial);
        self.sum_squares = sum_squares;
    }

    fn accept_relaxed(&mut self, sum_squares: f64) {
        std::mem::swap(&mut self.current, &mut self.relaxed);
        self.sum_squares = sum_squares;
    }

    fn accept_probe(&mut self, sum_squares: f64) {
        std::mem::swap(&mut self.current, &mut self.probe);
        self.sum_squares = sum_squares;
    }

    fn stats(&self) -> IterationStats {
        IterationStats {
            iteration: self.iterations,
            sum_squares: self.sum_squares,
            lambda: self.lambda,
        }
    }
}

/// What happened when probing with an undamped step.
enum Probe {
    /// Not tried this time, or it didn't improve.
    Skipped,
    /// Improved the fit.
    Accepted,
    /// Improved the fit, by less than the tolerance.
    Converged,
}

/// Relative change from `before` to `after`.
fn relative_change(before: f64, after: f64) -> f64 {
    (before - after).abs() / before
}

impl<M: Model + ?Sized> Problem<'_, M> {
    /// Run Levenberg-Marquardt from the guess in `params`.
    /// On success, or on giving up after improving the guess,
    /// the best parameters found are written back into `params`.
    pub fn minimize<F>(
        &mut self,
        params: &mut [f64],
        config: &Config,
        mut observer: F,
    ) -> Result<SolveOutcome, FailureOutcome>
    where
        F: FnMut(&IterationStats) -> Control,
    {
        let initial = self.sum_squares(params);
        if !initial.is_finite() {
            return Err(LmaError::NonFiniteResidual {
                sum_squares: initial,
            }
            .into());
        }
        let m = params.len();
        let mut state = State {
            current: params.to_vec(),
            sum_squares: initial,
            trial: vec![0.0; m],
            relaxed: vec![0.0; m],
            probe: vec![0.0; m],
            lambda: config.lambda,
            iterations: 0,
            stalls: 0,
        };

        match self.iterate(&mut state, config, &mut observer) {
            Ok(()) => {
                // A line (or worse) of equally good minima means the fit isn't unique.
                if let Err(error) = self.check_rank(&state.current) {
                    debug!(
                        iterations = state.iterations,
                        %error,
                        "converged to a degenerate point"
                    );
                    return Err(FailureOutcome {
                        error,
                        iterations: state.iterations,
                        best: None,
                    });
                }
                debug!(
                    iterations = state.iterations,
                    sum_squares = state.sum_squares,
                    lambda = state.lambda,
                    "converged"
                );
                params.copy_from_slice(&state.current);
                Ok(SolveOutcome {
                    sum_squares: state.sum_squares,
                    iterations: state.iterations,
                    lambda: state.lambda,
                })
            }
            Err(error) => {
                debug!(iterations = state.iterations, %error, "gave up");
                // Only write back if it's strictly better than what the caller already has.
                let best = (error.is_convergence_failure() && state.sum_squares < initial)
                    .then(|| {
                        params.copy_from_slice(&state.current);
                        BestEffort {
                            parameters: state.current,
                            sum_squares: state.sum_squares,
                        }
                    });
                Err(FailureOutcome {
                    error,
                    iterations: state.iterations,
                    best,
                })
            }
        }
    }

    /// Iterate until converged (`Ok`) or until something stops the solve.
    fn iterate<F>(
        &mut self,
        state: &mut State,
        config: &Config,
        observer: &mut F,
    ) -> Result<(), LmaError>
    where
        F: FnMut(&IterationStats) -> Control,
    {
        let tolerance = config.tolerance;
        let nu = config.nu;
        loop {
            if let Some(cap) = config.max_iterations.filter(|cap| *cap > 0)
                && state.iterations >= cap
            {
                return Err(LmaError::DidNotConverge);
            }
            if state.sum_squares == 0.0 {
                return Ok(());
            }
            state.iterations += 1;

            let s1 = self.trial_step(&state.current, state.lambda, &mut state.trial)?;
            if relative_change(state.sum_squares, s1) < tolerance {
                if s1 <= state.sum_squares {
                    state.accept_trial(s1);
                }
                observer(&state.stats());
                return Ok(());
            }

            let s2 = self.trial_step(&state.current, state.lambda / nu, &mut state.relaxed)?;

            if s1 >= state.sum_squares && s2 >= state.sum_squares {
                match self.probe(state, config) {
                    Probe::Converged => {
                        observer(&state.stats());
                        return Ok(());
                    }
                    Probe::Accepted => {
                        if observer(&state.stats()) == Control::Cancel {
                            return Err(LmaError::Cancelled);
                        }
                        continue;
                    }
                    Probe::Skipped => {}
                }
                state.stalls += 1;
                self.escalate(state, config, s1)?;
            } else if s2 < s1 {
                state.lambda /= nu;
                debug!(
                    iteration = state.iterations,
                    sum_squares = s2,
                    lambda = state.lambda,
                    "accepted step, decreased damping"
                );
                state.accept_relaxed(s2);
            } else {
                debug!(
                    iteration = state.iterations,
                    sum_squares = s1,
                    lambda = state.lambda,
                    "accepted step"
                );
                state.accept_trial(s1);
            }

            if observer(&state.stats()) == Control::Cancel {
                return Err(LmaError::Cancelled);
            }
        }
    }

    /// Every so often when stalled, try an undamped step,
    /// in case the damping is what's stopping progress.
    fn probe(&mut self, state: &mut State, config: &Config) -> Probe {
        let interval = config.stall.probe_interval;
        if interval == 0 || state.stalls % interval != 0 {
            return Probe::Skipped;
        }
        // An undamped system is singular more often than a damped one,
        // so a failed probe only means the probe didn't help.
        let s0 = match self.trial_step(&state.current, 0.0, &mut state.probe) {
            Ok(s0) => s0,
            Err(error) => {
                trace!(%error, "undamped probe failed");
                return Probe::Skipped;
            }
        };
        if s0 >= state.sum_squares {
            return Probe::Skipped;
        }
        debug!(
            iteration = state.iterations,
            sum_squares = s0,
            "accepted undamped probe"
        );
        let before = state.sum_squares;
        state.accept_probe(s0);
        if relative_change(before, s0) < config.tolerance {
            Probe::Converged
        } else {
            Probe::Accepted
        }
    }

    /// Both trial steps made things worse, so keep increasing the damping
    /// (shortening the step) until one improves, or until it's clear none will.
    fn escalate(&mut self, state: &mut State, config: &Config, s1: f64) -> Result<(), LmaError> {
        let stall = &config.stall;
        let mut s1 = s1;
        let mut retries = 0;
        let mut previous: Option<f64> = None;
        while s1 > state.sum_squares {
            let next = if state.lambda > 0.0 {
                state.lambda * config.nu
            } else {
                stall.restart_lambda.max(f64::MIN_POSITIVE)
            };
            if !next.is_finite() {
                break;
            }
            state.lambda = next;
            s1 = self.trial_step(&state.current, state.lambda, &mut state.trial)?;
            if s1 == 0.0 {
                break;
            }
            if let Some(previous) = previous
                && state.lambda > stall.retry_break_lambda
                && retries > stall.max_retries
                && previous < s1
            {
                break;
            }
            if state.lambda > stall.retry_count_lambda {
                retries += 1;
            }
            previous = Some(s1);
        }
        debug!(
            iteration = state.iterations,
            lambda = state.lambda,
            improved = s1 < state.sum_squares,
            "increased damping"
        );
        if s1 < state.sum_squares {
            state.accept_trial(s1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{FnModel, Observations, StallControl};

    use super::*;

    /// Runs the driver on a one-parameter model in normal mode, starting at 0.
    /// Returns the result, the final parameter, and λ after each iteration.
    fn drive<F>(
        value: F,
        config: &Config,
    ) -> (Result<SolveOutcome, FailureOutcome>, f64, Vec<f64>)
    where
        F: Fn(f64) -> f64,
    {
        // The reported derivative is always 1, whatever the model really does.
        let model = FnModel::new(2, |args: &[f64]| value(args[1]), |_: usize, _: &[f64]| 1.0);
        let x = [0.0];
        let observations = Observations::normal(vec![&x]).unwrap();
        let mut problem = Problem::new(&model, &observations, 1, config).unwrap();
        let mut params = [0.0];
        let mut lambdas = Vec::new();
        let result = problem.minimize(&mut params, config, |stats| {
            lambdas.push(stats.lambda);
            Control::Continue
        });
        (result, params[0], lambdas)
    }

    /// Worse everywhere except exactly at 0, and not monotonic in the step length,
    /// like a sum of squares that's reached the rounding-noise floor.
    fn noise_floor(p: f64) -> f64 {
        1.0 + (1e9 * p).sin().abs()
    }

    /// Uphill for every step towards -1, but lower at -1 itself.
    fn bump(p: f64) -> f64 {
        1.0 + 0.5 * p - 20.0 * p * (p + 1.0)
    }

    #[test]
    fn retries_stop_at_noise_floor() {
        let config = Config::default().with_max_iterations(1);
        let (result, p, lambdas) = drive(noise_floor, &config);
        assert_eq!(result.unwrap_err().error, LmaError::DidNotConverge);
        assert_eq!(p, 0.0);
        assert_eq!(lambdas.len(), 1);
        // Stopped by the retry limit, long before λ overflowed.
        let stopped_at = lambdas[0];
        assert!(stopped_at > config.stall.retry_break_lambda);
        assert!(stopped_at < 1e8, "{stopped_at}");

        // Never allowed to stop early, so it keeps shrinking the step.
        let unbounded = config.with_stall(StallControl {
            max_retries: usize::MAX,
            ..StallControl::default()
        });
        let (_, _, lambdas) = drive(noise_floor, &unbounded);
        assert!(lambdas[0] > 1e15, "{}", lambdas[0]);

        // Allowed to stop almost straight away.
        let impatient = config.with_stall(StallControl {
            retry_count_lambda: 0.0,
            retry_break_lambda: 0.0,
            max_retries: 0,
            ..StallControl::default()
        });
        let (_, _, lambdas) = drive(noise_floor, &impatient);
        assert!(lambdas[0] < 10.0, "{}", lambdas[0]);
    }

    #[test]
    fn undamped_step_can_converge() {
        // Both damped steps from 0 are uphill, the undamped one lands on -1.
        let config = Config::default().with_tolerance(0.9);
        let (result, p, lambdas) = drive(bump, &config);
        let outcome = result.unwrap();
        assert_eq!(outcome.iterations(), 1);
        assert_eq!(outcome.sum_squares(), 0.25);
        assert_eq!(p, -1.0);
        assert_eq!(lambdas, [config.lambda]);

        // Without the undamped step, damping only ever shrinks the step towards 0.
        let no_probe = config.with_stall(StallControl {
            probe_interval: 0,
            ..StallControl::default()
        });
        let (result, p, _) = drive(bump, &no_probe);
        let outcome = result.unwrap();
        assert!(outcome.iterations() > 1);
        assert!((outcome.sum_squares() - 1.0).abs() < 1e-9);
        assert!(p.abs() < 1e-9, "{p}");
    }

    #[test]
    fn capped_without_improvement_keeps_guess() {
        let config = Config::default()
            .with_max_iterations(1)
            .with_stall(StallControl {
                probe_interval: 0,
                ..StallControl::default()
            });
        let (result, p, lambdas) = drive(bump, &config);
        let failure = result.unwrap_err();
        assert_eq!(failure.error, LmaError::DidNotConverge);
        assert_eq!(failure.iterations, 1);
        assert!(failure.best.is_none());
        assert_eq!(p, 0.0);
        // It did try: damping grew while looking for an improvement.
        assert!(lambdas[0] > config.lambda);
    }

    #[test]
    fn relative_change_is_symmetric() {
        assert_eq!(relative_change(4.0, 3.0), 0.25);
        assert_eq!(relative_change(4.0, 5.0), 0.25);
    }
}
