//! Implicit one-step integrators with embedded error estimates.
//!
//! Both methods solve their stage equations with Newton's method, using the
//! iteration matrix `I - h*g*J` with `J` evaluated once at the start of the
//! step. A stage solve that fails to converge is reported as `Ok(None)` so
//! the driver can shrink the step; errors raised by the model propagate.

use crate::error::{SimError, SimResult};
use crate::model::OdeModel;
use crate::sim::IntegrationOptions;
use nalgebra::{DMatrix, DVector};
use rx_solver::{NewtonConfig, newton_solve};

/// A completed step attempt.
#[derive(Clone, Debug)]
pub struct StepOutcome {
    /// State at `x + h`
    pub y: DVector<f64>,
    /// Weighted RMS of the local error estimate; the step is acceptable at <= 1
    pub error_norm: f64,
}

/// Trait for one-step integrators.
pub trait Integrator {
    /// Attempt one step of size `h` from `(x, y)`.
    fn step<M: OdeModel + ?Sized>(
        &self,
        model: &M,
        x: f64,
        y: &DVector<f64>,
        h: f64,
        opts: &IntegrationOptions,
    ) -> SimResult<Option<StepOutcome>>;
}

/// Two-stage, L-stable, stiffly accurate SDIRK with `g = 1 - 1/sqrt(2)`.
///
/// ```text
///   g | g    0
///   1 | 1-g  g
///  ---+---------
///     | 1-g  g     second order
///     | 1    0     first order, error estimate
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Sdirk2;

impl Sdirk2 {
    pub const GAMMA: f64 = 1.0 - std::f64::consts::FRAC_1_SQRT_2;
}

impl Integrator for Sdirk2 {
    fn step<M: OdeModel + ?Sized>(
        &self,
        model: &M,
        x: f64,
        y: &DVector<f64>,
        h: f64,
        opts: &IntegrationOptions,
    ) -> SimResult<Option<StepOutcome>> {
        let g = Self::GAMMA;
        let hg = h * g;
        let f0 = model.rhs(x, y)?;
        let iteration = iteration_matrix(model, x, y, &f0, hg)?;

        let guess = y + &f0 * hg;
        let Some(y1) = solve_stage(model, x + hg, y, hg, guess, &iteration, &opts.newton)? else {
            return Ok(None);
        };
        let k1 = (&y1 - y) / hg;

        let base = y + &k1 * (h * (1.0 - g));
        let guess = &base + &k1 * hg;
        let Some(y2) = solve_stage(model, x + h, &base, hg, guess, &iteration, &opts.newton)?
        else {
            return Ok(None);
        };
        let k2 = (&y2 - &base) / hg;

        let error = (k2 - k1) * hg;
        let error_norm = weighted_rms(&error, y, &y2, opts.atol, opts.rtol);
        Ok(Some(StepOutcome { y: y2, error_norm }))
    }
}

/// First-order backward Euler.
///
/// The error estimate is `h/2 * (f(x+h, y_new) - f(x, y))`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BackwardEuler;

impl Integrator for BackwardEuler {
    fn step<M: OdeModel + ?Sized>(
        &self,
        model: &M,
        x: f64,
        y: &DVector<f64>,
        h: f64,
        opts: &IntegrationOptions,
    ) -> SimResult<Option<StepOutcome>> {
        let f0 = model.rhs(x, y)?;
        let iteration = iteration_matrix(model, x, y, &f0, h)?;

        let guess = y + &f0 * h;
        let Some(y1) = solve_stage(model, x + h, y, h, guess, &iteration, &opts.newton)? else {
            return Ok(None);
        };
        let k1 = (&y1 - y) / h;

        let error = (k1 - f0) * (0.5 * h);
        let error_norm = weighted_rms(&error, y, &y1, opts.atol, opts.rtol);
        Ok(Some(StepOutcome { y: y1, error_norm }))
    }
}

fn iteration_matrix<M: OdeModel + ?Sized>(
    model: &M,
    x: f64,
    y: &DVector<f64>,
    f0: &DVector<f64>,
    hg: f64,
) -> SimResult<DMatrix<f64>> {
    let jac = model.jacobian(x, y, f0)?;
    let n = y.len();
    if jac.shape() != (n, n) {
        return Err(SimError::InvalidArg {
            what: format!("Jacobian is {:?}, expected ({n}, {n})", jac.shape()),
        });
    }
    Ok(DMatrix::identity(n, n) - jac * hg)
}

/// Solve `z = base + hg * f(xs, z)` for `z`.
fn solve_stage<M: OdeModel + ?Sized>(
    model: &M,
    xs: f64,
    base: &DVector<f64>,
    hg: f64,
    guess: DVector<f64>,
    iteration: &DMatrix<f64>,
    newton: &NewtonConfig,
) -> SimResult<Option<DVector<f64>>> {
    let residual = |z: &DVector<f64>| -> SimResult<DVector<f64>> {
        let f = model.rhs(xs, z)?;
        Ok(z - base - f * hg)
    };
    let jacobian = |_: &DVector<f64>| -> SimResult<DMatrix<f64>> { Ok(iteration.clone()) };

    match newton_solve(guess, residual, jacobian, newton) {
        Ok(result) if result.converged && result.x.iter().all(|v| v.is_finite()) => {
            Ok(Some(result.x))
        }
        Ok(_) | Err(SimError::Solver(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Root mean square of `e_i / (atol + rtol * max(|y_i|, |y_new_i|))`.
pub(crate) fn weighted_rms(
    error: &DVector<f64>,
    y: &DVector<f64>,
    y_new: &DVector<f64>,
    atol: f64,
    rtol: f64,
) -> f64 {
    let n = error.len();
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = error
        .iter()
        .zip(y.iter().zip(y_new.iter()))
        .map(|(e, (a, b))| {
            let scale = atol + rtol * a.abs().max(b.abs());
            (e / scale).powi(2)
        })
        .sum();
    (sum / n as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay {
        k: f64,
    }

    impl OdeModel for Decay {
        fn dim(&self) -> usize {
            1
        }

        fn initial_state(&self) -> DVector<f64> {
            DVector::from_element(1, 1.0)
        }

        fn rhs(&self, _x: f64, y: &DVector<f64>) -> SimResult<DVector<f64>> {
            Ok(y * -self.k)
        }
    }

    #[test]
    fn sdirk2_single_step_is_second_order() {
        let model = Decay { k: 1.0 };
        let opts = IntegrationOptions::default();
        let y0 = model.initial_state();
        let h = 0.01;
        let out = Sdirk2.step(&model, 0.0, &y0, h, &opts).unwrap().unwrap();
        let exact = (-h).exp();
        // Local error of a second-order method is O(h^3)
        assert!((out.y[0] - exact).abs() < 1e-6);
    }

    #[test]
    fn sdirk2_is_l_stable() {
        // A huge step on a very stiff decay must damp, not oscillate
        let model = Decay { k: 1e6 };
        let opts = IntegrationOptions::default();
        let y0 = model.initial_state();
        let out = Sdirk2.step(&model, 0.0, &y0, 1.0, &opts).unwrap().unwrap();
        assert!(out.y[0].abs() < 1e-5);
    }

    #[test]
    fn backward_euler_matches_closed_form() {
        // y1 = y0 / (1 + k h) for linear decay
        let model = Decay { k: 2.0 };
        let opts = IntegrationOptions::default();
        let y0 = model.initial_state();
        let out = BackwardEuler.step(&model, 0.0, &y0, 0.1, &opts).unwrap().unwrap();
        assert!((out.y[0] - 1.0 / 1.2).abs() < 1e-9);
        assert!(out.error_norm > 0.0);
    }

    #[test]
    fn error_norm_shrinks_with_step() {
        let model = Decay { k: 1.0 };
        let opts = IntegrationOptions::default();
        let y0 = model.initial_state();
        let big = Sdirk2.step(&model, 0.0, &y0, 0.1, &opts).unwrap().unwrap();
        let small = Sdirk2.step(&model, 0.0, &y0, 0.05, &opts).unwrap().unwrap();
        // Embedded estimate is O(h^2): halving h cuts it by about four
        let ratio = big.error_norm / small.error_norm;
        assert!(ratio > 3.0 && ratio < 5.0, "ratio = {ratio}");
    }

    #[test]
    fn weighted_rms_scales_by_tolerance() {
        let e = DVector::from_vec(vec![1e-6, 0.0]);
        let y = DVector::from_vec(vec![1.0, 0.0]);
        let rms = weighted_rms(&e, &y, &y, 1e-9, 1e-6);
        let first: f64 = 1e-6 / (1e-9 + 1e-6);
        assert!((rms - (first * first / 2.0).sqrt()).abs() < 1e-12);
    }
}
