//! Time (or volume) to reach a target conversion.

use crate::error::{ReactorError, ReactorResult};
use crate::ode::ReactorOde;
use crate::reactor::Reactor;
use crate::run::{ReactorRun, StatePoint};
use crate::steady::SteadyStateOptions;
use serde::Serialize;

/// Upper bound on re-integration passes when narrowing a crossing.
const MAX_REFINEMENTS: usize = 8;

/// Where a species first reaches a target conversion.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversionPoint {
    /// Full state at the crossing; `point.x` is the conversion time
    pub point: StatePoint,
    pub species: String,
    pub target: f64,
    /// Conversion at steady state
    pub achievable: f64,
}

impl Reactor {
    /// Find where `species` first reaches `target` conversion.
    ///
    /// Conversion is measured against the initial bulk concentration, or the
    /// inlet concentration for a PFR: `X = (c0 - c) / c0`. The search runs
    /// the steady-state search from `guess` and rejects targets beyond the
    /// steady-state conversion. The first pair of samples bracketing
    /// `c0 * (1 - target)` is then re-integrated on a finer grid until the
    /// bracket is narrower than the integrator's relative tolerance, and the
    /// crossing is interpolated within it.
    ///
    /// A fed vessel that starts empty still uses its configured initial
    /// concentrations as the reference, even though it reports the inlet
    /// concentrations at the start.
    ///
    /// # Errors
    ///
    /// - `Configuration` for an unknown species, a zero reference
    ///   concentration, or a target outside `[0, 1]`
    /// - `ConversionUnreachable` if the target exceeds the steady-state conversion
    /// - anything `find_steady_state` returns
    pub fn find_conversion(
        &self,
        species: &str,
        target: f64,
        guess: f64,
    ) -> ReactorResult<ConversionPoint> {
        let j = self
            .network()
            .species_index(species)
            .ok_or_else(|| ReactorError::config(format!("unknown species '{species}'")))?;
        if !(0.0..=1.0).contains(&target) {
            return Err(ReactorError::config(format!(
                "conversion target must be within [0, 1], got {target}"
            )));
        }
        let c0 = self.reference_concentrations()[j];
        if c0 <= 0.0 {
            return Err(ReactorError::config(format!(
                "reference concentration of '{species}' is zero, conversion is undefined"
            )));
        }

        let steady = self.steady_state_run(&SteadyStateOptions {
            guess,
            ..SteadyStateOptions::default()
        })?;
        let c_ss = steady.run.concentrations[(steady.sample, j)];
        let achievable = (c0 - c_ss) / c0;
        if target > achievable {
            tracing::warn!(species, target, achievable, "conversion target unreachable");
            return Err(ReactorError::ConversionUnreachable {
                species: species.to_string(),
                target,
                achievable,
            });
        }

        let c_target = c0 * (1.0 - target);
        let i = first_at_or_below(&steady.run, j, c_target, steady.sample);
        let point = self.refine_crossing(steady.run, i, j, c_target)?;

        tracing::debug!(species, target, x = point.x, "conversion reached");
        Ok(ConversionPoint {
            point,
            species: species.to_string(),
            target,
            achievable,
        })
    }

    /// Narrow the crossing bracketed by samples `i - 1` and `i` by
    /// re-integrating between them, then interpolate inside the last bracket.
    fn refine_crossing(
        &self,
        mut run: ReactorRun,
        mut i: usize,
        j: usize,
        c_target: f64,
    ) -> ReactorResult<StatePoint> {
        let opts = self.integration_options();
        for _ in 0..MAX_REFINEMENTS {
            if i == 0 {
                return Ok(self.sample_point(&run, 0));
            }
            let (xa, xb) = (run.x[i - 1], run.x[i]);
            if xb - xa <= (opts.rtol * xb.abs()).max(1e4 * opts.h_min) {
                break;
            }
            let ode = ReactorOde::resume(self, self.state_at(&run, i - 1));
            let pass = self.run_pass(ode, (xa, xb), false)?;
            let last = pass.len() - 1;
            i = first_at_or_below(&pass, j, c_target, last);
            run = pass;
            tracing::trace!(xa, xb, "conversion bracket narrowed");
        }

        if i == 0 {
            return Ok(self.sample_point(&run, 0));
        }
        let column = run.concentrations.column(j);
        let (a, b) = (column[i - 1], column[i]);
        let theta = if a > b { (a - c_target) / (a - b) } else { 1.0 };
        Ok(self.interpolated_point(&run, i, theta.clamp(0.0, 1.0)))
    }
}

/// First sample up to `limit` where species `j` is at or below `c_target`.
fn first_at_or_below(run: &ReactorRun, j: usize, c_target: f64, limit: usize) -> usize {
    let column = run.concentrations.column(j);
    (0..=limit)
        .find(|&i| column[i] <= c_target)
        .unwrap_or(limit)
}
