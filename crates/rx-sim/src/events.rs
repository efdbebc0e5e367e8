//! Switching-point location for mode changes during integration.

use crate::error::{SimError, SimResult};
use crate::integrator::Integrator;
use crate::model::OdeModel;
use crate::sim::IntegrationOptions;
use nalgebra::DVector;

/// Upper bound on bisection rounds; 200 halvings exhaust f64 resolution.
const MAX_BISECTIONS: usize = 200;

/// True when the switching function went from negative to non-negative.
pub(crate) fn crossed(g0: Option<f64>, g1: Option<f64>) -> bool {
    matches!((g0, g1), (Some(a), Some(b)) if a < 0.0 && b >= 0.0)
}

/// Locate the switching point inside an accepted step `(x, y) -> (x + h, y_h)`.
///
/// Bisects on the step length, taking every trial as a fresh step from
/// `(x, y)`. Returns the smallest bracketing length found, whose state has a
/// non-negative switching function, together with that state.
pub(crate) fn locate<M, I>(
    integrator: &I,
    model: &M,
    x: f64,
    y: &DVector<f64>,
    h: f64,
    y_h: DVector<f64>,
    opts: &IntegrationOptions,
) -> SimResult<(f64, DVector<f64>)>
where
    M: OdeModel + ?Sized,
    I: Integrator,
{
    let tol = opts.event_tolerance * x.abs().max(1.0);
    let mut lo = 0.0;
    let mut hi = h;
    let mut y_hi = y_h;

    for _ in 0..MAX_BISECTIONS {
        if hi - lo <= tol {
            break;
        }
        let mid = 0.5 * (lo + hi);
        let trial = integrator
            .step(model, x, y, mid, opts)?
            .ok_or_else(|| SimError::Integration {
                x: x + mid,
                what: "stage solve failed while locating a switching point".to_string(),
            })?;

        if model.event(x + mid, &trial.y).is_some_and(|g| g >= 0.0) {
            hi = mid;
            y_hi = trial.y;
        } else {
            lo = mid;
        }
    }

    Ok((hi, y_hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rising_crossing_only() {
        assert!(crossed(Some(-1.0), Some(0.0)));
        assert!(crossed(Some(-1.0), Some(2.0)));
        assert!(!crossed(Some(1.0), Some(-1.0)));
        assert!(!crossed(Some(0.0), Some(1.0)));
        assert!(!crossed(None, Some(1.0)));
        assert!(!crossed(Some(-1.0), None));
    }
}
