//! Steady-state search.

use crate::error::{ReactorError, ReactorResult};
use crate::kind::ReactorKind;
use crate::reactor::Reactor;
use crate::run::{ReactorRun, StatePoint};
use serde::Serialize;

/// Options for [`Reactor::find_steady_state`].
#[derive(Clone, Debug, PartialEq)]
pub struct SteadyStateOptions {
    /// First horizon (time, or volume for a PFR)
    pub guess: f64,
    /// Steady once every |transformation rate| is below this
    pub threshold: f64,
    /// Number of horizons to try, each twice the previous
    pub max_iterations: usize,
}

impl Default for SteadyStateOptions {
    fn default() -> Self {
        Self {
            guess: 10.0,
            threshold: 1e-3,
            max_iterations: 10,
        }
    }
}

impl SteadyStateOptions {
    pub fn validate(&self) -> ReactorResult<()> {
        if !(self.guess > 0.0 && self.guess.is_finite()) {
            return Err(ReactorError::config(format!(
                "steady-state guess must be positive, got {}",
                self.guess
            )));
        }
        if !(self.threshold > 0.0 && self.threshold.is_finite()) {
            return Err(ReactorError::config(format!(
                "steady-state threshold must be positive, got {}",
                self.threshold
            )));
        }
        if self.max_iterations == 0 {
            return Err(ReactorError::config("max_iterations must be at least 1"));
        }
        Ok(())
    }
}

/// Result of a steady-state search.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SteadyState {
    /// State at the steady-state point; `point.x` is the steady-state time
    pub point: StatePoint,
    /// Horizons integrated; zero for the closed-form CSTR rule
    pub iterations: usize,
    /// Last horizon integrated
    pub horizon: f64,
}

/// Steady state with the run it was found in.
pub(crate) struct SteadyRun {
    pub steady: SteadyState,
    pub run: ReactorRun,
    /// Sample index of the steady-state point
    pub sample: usize,
}

impl Reactor {
    /// Find when the reactor reaches steady state.
    ///
    /// A CSTR is at steady state after three residence times, measured from
    /// the start; its state there comes from a single run of that length.
    /// Every other topology is integrated to `guess`, then to twice the
    /// previous horizon, until the largest |transformation rate| at the end
    /// of the run is below `threshold`. The reported point is the earliest
    /// sample from which the rates stay below the threshold.
    ///
    /// # Errors
    ///
    /// `SteadyStateNotReached` if `max_iterations` horizons are exhausted.
    pub fn find_steady_state(&self, options: &SteadyStateOptions) -> ReactorResult<SteadyState> {
        self.steady_state_run(options).map(|s| s.steady)
    }

    pub(crate) fn steady_state_run(&self, options: &SteadyStateOptions) -> ReactorResult<SteadyRun> {
        options.validate()?;

        if self.kind() == ReactorKind::Cstr {
            let tau = self
                .residence_time()
                .ok_or_else(|| ReactorError::config("CSTR without a flow rate"))?;
            let t_ss = 3.0 * tau;
            let run = self.run_to(t_ss, true)?;
            let sample = run.len() - 1;
            tracing::debug!(t_ss, tau, "CSTR steady state after three residence times");
            return Ok(SteadyRun {
                steady: SteadyState {
                    point: self.sample_point(&run, sample),
                    iterations: 0,
                    horizon: t_ss,
                },
                run,
                sample,
            });
        }

        let mut horizon = options.guess;
        let mut max_rate = f64::INFINITY;
        for iteration in 1..=options.max_iterations {
            let run = self.run_to(horizon, true)?;
            let last = run.len() - 1;
            max_rate = run.max_rate_at(last).unwrap_or(f64::INFINITY);

            if max_rate < options.threshold {
                let mut sample = last;
                while sample > 0
                    && run
                        .max_rate_at(sample - 1)
                        .is_some_and(|r| r < options.threshold)
                {
                    sample -= 1;
                }
                let point = self.sample_point(&run, sample);
                tracing::debug!(
                    iteration,
                    horizon,
                    x = point.x,
                    "steady state reached"
                );
                return Ok(SteadyRun {
                    steady: SteadyState {
                        point,
                        iterations: iteration,
                        horizon,
                    },
                    run,
                    sample,
                });
            }

            tracing::debug!(iteration, horizon, max_rate, "not steady yet, doubling horizon");
            if iteration < options.max_iterations {
                horizon *= 2.0;
            }
        }

        tracing::warn!(
            iterations = options.max_iterations,
            horizon,
            max_rate,
            "steady state not reached"
        );
        Err(ReactorError::SteadyStateNotReached {
            iterations: options.max_iterations,
            horizon,
            max_rate,
        })
    }
}
