//! OdeModel trait for pluggable dynamic systems.

use crate::error::SimResult;
use nalgebra::{DMatrix, DVector};
use rx_solver::finite_difference_jacobian;

/// Relative perturbation for the default finite difference Jacobian.
const JACOBIAN_EPS: f64 = 1e-8;

/// A system `dy/dx = f(x, y)` with an optional switching function.
///
/// The independent variable is usually time, but nothing here assumes so.
/// Models with discrete modes expose a switching function through `event`;
/// the integrator calls `on_event` once the function crosses from negative
/// to non-negative, after which the model is expected to change mode.
pub trait OdeModel {
    /// Number of state variables.
    fn dim(&self) -> usize;

    /// State at the start of the integration span.
    fn initial_state(&self) -> DVector<f64>;

    /// Compute the state derivative `f(x, y)`.
    fn rhs(&self, x: f64, y: &DVector<f64>) -> SimResult<DVector<f64>>;

    /// Jacobian `df/dy` at `(x, y)`, given `f(x, y)`.
    ///
    /// Defaults to forward differences. Override for analytical Jacobians.
    fn jacobian(&self, x: f64, y: &DVector<f64>, f_y: &DVector<f64>) -> SimResult<DMatrix<f64>> {
        finite_difference_jacobian(y, f_y, |z| self.rhs(x, z), JACOBIAN_EPS)
    }

    /// Switching function in the current mode, or `None` when no switch is pending.
    fn event(&self, _x: f64, _y: &DVector<f64>) -> Option<f64> {
        None
    }

    /// Called at a located switching point. May adjust the state in place.
    fn on_event(&mut self, _x: f64, _y: &mut DVector<f64>) -> SimResult<()> {
        Ok(())
    }
}
