//! Adaptive integration driver and trajectory recording.

use crate::error::{SimError, SimResult};
use crate::events;
use crate::integrator::{BackwardEuler, Integrator, Sdirk2};
use crate::model::OdeModel;
use nalgebra::DVector;
use rx_core::{ensure_finite, lerp, linspace};
use rx_solver::NewtonConfig;
use std::str::FromStr;

/// Integrator selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntegratorType {
    /// L-stable two-stage SDIRK (default, second order).
    #[default]
    Sdirk2,
    /// Backward Euler (first order, most damping).
    BackwardEuler,
}

impl FromStr for IntegratorType {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sdirk2" => Ok(Self::Sdirk2),
            "backward-euler" | "backward_euler" | "beuler" => Ok(Self::BackwardEuler),
            other => Err(SimError::InvalidArg {
                what: format!("unknown integrator '{other}'"),
            }),
        }
    }
}

/// Options for integration runs.
#[derive(Clone, Debug, PartialEq)]
pub struct IntegrationOptions {
    /// Relative tolerance of the local error estimate
    pub rtol: f64,
    /// Absolute tolerance of the local error estimate
    pub atol: f64,
    /// Number of evenly spaced output samples, endpoints included
    pub samples: usize,
    /// Largest step as a fraction of the span
    pub max_step_fraction: f64,
    /// Smallest step before giving up
    pub h_min: f64,
    /// Maximum number of step attempts (safety limit)
    pub max_steps: usize,
    /// Relative width of the bracket when locating a switching point
    pub event_tolerance: f64,
    /// Integrator type (default: SDIRK2)
    pub integrator: IntegratorType,
    /// Stage solve settings
    pub newton: NewtonConfig,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            samples: 1000,
            max_step_fraction: 0.01,
            h_min: 1e-12,
            max_steps: 500_000,
            event_tolerance: 1e-10,
            integrator: IntegratorType::default(),
            newton: NewtonConfig {
                max_iterations: 20,
                ..NewtonConfig::default()
            },
        }
    }
}

impl IntegrationOptions {
    pub fn validate(&self) -> SimResult<()> {
        let invalid = |what: String| Err(SimError::InvalidArg { what });
        if !(self.rtol > 0.0 && self.rtol.is_finite()) {
            return invalid(format!("rtol must be positive, got {}", self.rtol));
        }
        if !(self.atol > 0.0 && self.atol.is_finite()) {
            return invalid(format!("atol must be positive, got {}", self.atol));
        }
        if self.samples < 2 {
            return invalid(format!("samples must be at least 2, got {}", self.samples));
        }
        if !(self.max_step_fraction > 0.0 && self.max_step_fraction <= 1.0) {
            return invalid(format!(
                "max_step_fraction must be in (0, 1], got {}",
                self.max_step_fraction
            ));
        }
        if !(self.h_min > 0.0 && self.h_min.is_finite()) {
            return invalid(format!("h_min must be positive, got {}", self.h_min));
        }
        if self.max_steps == 0 {
            return invalid("max_steps must be positive".to_string());
        }
        if !(self.event_tolerance > 0.0 && self.event_tolerance.is_finite()) {
            return invalid(format!(
                "event_tolerance must be positive, got {}",
                self.event_tolerance
            ));
        }
        self.newton.validate()?;
        Ok(())
    }
}

/// A located switching point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventRecord {
    /// Independent variable at the switch
    pub x: f64,
    /// Index of the sample recorded at the switch
    pub sample: usize,
}

/// Step counters for one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntegrationStats {
    pub accepted: usize,
    pub rejected: usize,
    pub stage_failures: usize,
}

/// Sampled solution of one integration run.
///
/// Samples lie on the evenly spaced output grid, plus one extra sample at
/// every switching point.
#[derive(Clone, Debug)]
pub struct Trajectory {
    /// Independent variable at each sample
    pub x: Vec<f64>,
    /// State at each sample
    pub y: Vec<DVector<f64>>,
    /// Located switching points
    pub events: Vec<EventRecord>,
    pub stats: IntegrationStats,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn last(&self) -> Option<(f64, &DVector<f64>)> {
        self.x.last().copied().zip(self.y.last())
    }

    /// Linear interpolation between samples; `None` outside the sampled range.
    pub fn interpolate(&self, x: f64) -> Option<DVector<f64>> {
        let first = *self.x.first()?;
        let last = *self.x.last()?;
        if !(first..=last).contains(&x) {
            return None;
        }
        let i = self.x.partition_point(|&xi| xi < x);
        if i == 0 || self.x[i] == x {
            return Some(self.y[i].clone());
        }
        let (x0, x1) = (self.x[i - 1], self.x[i]);
        let t = if x1 > x0 { (x - x0) / (x1 - x0) } else { 1.0 };
        Some(self.y[i - 1].zip_map(&self.y[i], |a, b| lerp(a, b, t)))
    }
}

/// Integrate `model` over `span = (x0, x1)` with the selected integrator.
pub fn integrate<M: OdeModel + ?Sized>(
    model: &mut M,
    span: (f64, f64),
    opts: &IntegrationOptions,
) -> SimResult<Trajectory> {
    match opts.integrator {
        IntegratorType::Sdirk2 => drive(&Sdirk2, model, span, opts),
        IntegratorType::BackwardEuler => drive(&BackwardEuler, model, span, opts),
    }
}

/// Step size growth factor from a weighted error norm; estimate is O(h^2).
fn step_factor(error_norm: f64) -> f64 {
    if error_norm == 0.0 {
        4.0
    } else {
        (0.9 * error_norm.powf(-0.5)).clamp(0.25, 4.0)
    }
}

fn drive<I, M>(
    integrator: &I,
    model: &mut M,
    span: (f64, f64),
    opts: &IntegrationOptions,
) -> SimResult<Trajectory>
where
    I: Integrator,
    M: OdeModel + ?Sized,
{
    opts.validate()?;
    let (x0, x1) = span;
    ensure_finite(x0, "span start")?;
    ensure_finite(x1, "span end")?;
    if x1 <= x0 {
        return Err(SimError::InvalidArg {
            what: format!("integration span must be increasing, got ({x0}, {x1})"),
        });
    }

    let mut y = model.initial_state();
    if y.len() != model.dim() {
        return Err(SimError::InvalidArg {
            what: format!(
                "initial state has {} entries, model dimension is {}",
                y.len(),
                model.dim()
            ),
        });
    }
    if let Some(v) = y.iter().find(|v| !v.is_finite()) {
        return Err(SimError::NonPhysical {
            what: format!("initial state is not finite: {v}"),
        });
    }

    let grid = linspace(x0, x1, opts.samples);
    let h_max = (x1 - x0) * opts.max_step_fraction;
    let mut h = (1e-3 * (x1 - x0)).max(opts.h_min).min(h_max);

    let mut traj = Trajectory {
        x: Vec::with_capacity(grid.len()),
        y: Vec::with_capacity(grid.len()),
        events: Vec::new(),
        stats: IntegrationStats::default(),
    };
    traj.x.push(x0);
    traj.y.push(y.clone());

    let mut x = x0;
    let mut next = 1;
    let mut attempts = 0;

    while next < grid.len() {
        let target = grid[next];
        if target - x <= 4.0 * f64::EPSILON * target.abs().max(1.0) {
            // A switching point landed on the grid point within rounding.
            x = target;
            traj.x.push(x);
            traj.y.push(y.clone());
            next += 1;
            continue;
        }
        if attempts >= opts.max_steps {
            return Err(SimError::Integration {
                x,
                what: format!("exceeded max_steps = {}", opts.max_steps),
            });
        }
        attempts += 1;

        let to_target = target - x;
        let truncated = h >= to_target;
        let h_try = if truncated { to_target } else { h.min(h_max) };

        let outcome = match integrator.step(&*model, x, &y, h_try, opts)? {
            Some(out) if out.error_norm <= 1.0 && out.y.iter().all(|v| v.is_finite()) => out,
            Some(out) => {
                traj.stats.rejected += 1;
                let factor = if out.error_norm.is_finite() {
                    step_factor(out.error_norm).min(0.9)
                } else {
                    0.25
                };
                h = h_try * factor;
                check_step(h, x, opts)?;
                continue;
            }
            None => {
                traj.stats.stage_failures += 1;
                h = 0.5 * h_try;
                check_step(h, x, opts)?;
                continue;
            }
        };
        traj.stats.accepted += 1;

        let factor = step_factor(outcome.error_norm);
        h = if truncated && factor >= 1.0 {
            h.max(h_try * factor).min(h_max)
        } else {
            (h_try * factor).min(h_max)
        };

        if events::crossed(model.event(x, &y), model.event(x + h_try, &outcome.y)) {
            let (h_event, mut y_event) =
                events::locate(integrator, &*model, x, &y, h_try, outcome.y, opts)?;
            let at_target = truncated && h_event >= h_try;
            x = if at_target { target } else { x + h_event };
            model.on_event(x, &mut y_event)?;
            tracing::debug!(x, "switching point located");

            traj.events.push(EventRecord {
                x,
                sample: traj.x.len(),
            });
            traj.x.push(x);
            traj.y.push(y_event.clone());
            y = y_event;
            if at_target {
                next += 1;
            }
            continue;
        }

        y = outcome.y;
        if truncated {
            x = target;
            traj.x.push(x);
            traj.y.push(y.clone());
            next += 1;
        } else {
            x += h_try;
        }
    }

    tracing::trace!(
        accepted = traj.stats.accepted,
        rejected = traj.stats.rejected,
        stage_failures = traj.stats.stage_failures,
        "integration finished"
    );

    Ok(traj)
}

fn check_step(h: f64, x: f64, opts: &IntegrationOptions) -> SimResult<()> {
    if h < opts.h_min {
        return Err(SimError::Integration {
            x,
            what: format!("step size {h:e} fell below h_min = {:e}", opts.h_min),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integration_options_defaults() {
        let opts = IntegrationOptions::default();
        assert_eq!(opts.rtol, 1e-6);
        assert_eq!(opts.atol, 1e-9);
        assert_eq!(opts.samples, 1000);
        assert_eq!(opts.max_step_fraction, 0.01);
        assert_eq!(opts.max_steps, 500_000);
        assert_eq!(opts.integrator, IntegratorType::Sdirk2);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn integration_options_invalid() {
        let opts = IntegrationOptions {
            samples: 1,
            ..IntegrationOptions::default()
        };
        assert!(matches!(opts.validate(), Err(SimError::InvalidArg { .. })));

        let opts = IntegrationOptions {
            rtol: -1.0,
            ..IntegrationOptions::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn integrator_type_from_str() {
        assert_eq!("SDIRK2".parse::<IntegratorType>().unwrap(), IntegratorType::Sdirk2);
        assert_eq!(
            "backward-euler".parse::<IntegratorType>().unwrap(),
            IntegratorType::BackwardEuler
        );
        assert!("rk4".parse::<IntegratorType>().is_err());
    }

    #[test]
    fn interpolate_between_samples() {
        let traj = Trajectory {
            x: vec![0.0, 1.0, 2.0],
            y: vec![
                DVector::from_element(1, 0.0),
                DVector::from_element(1, 10.0),
                DVector::from_element(1, 20.0),
            ],
            events: Vec::new(),
            stats: IntegrationStats::default(),
        };
        assert_eq!(traj.interpolate(0.5).unwrap()[0], 5.0);
        assert_eq!(traj.interpolate(2.0).unwrap()[0], 20.0);
        assert_eq!(traj.interpolate(0.0).unwrap()[0], 0.0);
        assert!(traj.interpolate(2.5).is_none());
        assert_eq!(traj.last().unwrap().0, 2.0);
    }
}
