//! Damped Newton iteration for small dense systems.

use crate::error::SolverError;
use nalgebra::{DMatrix, DVector};

/// Newton solver configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct NewtonConfig {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Absolute tolerance on residual norm and step size
    pub abs_tol: f64,
    /// Relative tolerance on residual reduction and step size
    pub rel_tol: f64,
    /// Line search backtracking factor, 1.0 disables backtracking
    pub line_search_beta: f64,
    /// Maximum line search iterations
    pub max_line_search_iters: usize,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            abs_tol: 1e-10,
            rel_tol: 1e-8,
            line_search_beta: 0.5,
            max_line_search_iters: 10,
        }
    }
}

impl NewtonConfig {
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.max_iterations == 0 {
            return Err(SolverError::InvalidConfig {
                what: "max_iterations must be at least 1".to_string(),
            });
        }
        if !(self.abs_tol > 0.0 && self.abs_tol.is_finite()) {
            return Err(SolverError::InvalidConfig {
                what: format!("abs_tol must be positive, got {}", self.abs_tol),
            });
        }
        if !(self.rel_tol >= 0.0 && self.rel_tol.is_finite()) {
            return Err(SolverError::InvalidConfig {
                what: format!("rel_tol must be non-negative, got {}", self.rel_tol),
            });
        }
        if !(self.line_search_beta > 0.0 && self.line_search_beta <= 1.0) {
            return Err(SolverError::InvalidConfig {
                what: format!(
                    "line_search_beta must be in (0, 1], got {}",
                    self.line_search_beta
                ),
            });
        }
        Ok(())
    }
}

/// Newton iteration result.
#[derive(Debug, Clone)]
pub struct NewtonResult {
    /// Solution vector
    pub x: DVector<f64>,
    /// Final residual norm
    pub residual_norm: f64,
    /// Number of iterations
    pub iterations: usize,
    /// Converged flag
    pub converged: bool,
}

/// Solve `residual(x) = 0` starting from `x0`.
///
/// Running out of iterations is not an error: the result comes back with
/// `converged == false` so the caller can shrink its step and retry. A
/// singular Jacobian or a non-finite residual is an error.
pub fn newton_solve<F, J, E>(
    x0: DVector<f64>,
    mut residual_fn: F,
    mut jacobian_fn: J,
    config: &NewtonConfig,
) -> Result<NewtonResult, E>
where
    F: FnMut(&DVector<f64>) -> Result<DVector<f64>, E>,
    J: FnMut(&DVector<f64>) -> Result<DMatrix<f64>, E>,
    E: From<SolverError>,
{
    let mut x = x0;
    let mut r = residual_fn(&x)?;
    let mut r_norm = r.norm();
    if !r_norm.is_finite() {
        return Err(SolverError::NonFinite {
            what: "initial Newton residual".to_string(),
        }
        .into());
    }
    let r0_norm = r_norm;

    for iter in 0..config.max_iterations {
        if r_norm <= config.abs_tol || r_norm < config.rel_tol * r0_norm {
            return Ok(NewtonResult {
                x,
                residual_norm: r_norm,
                iterations: iter,
                converged: true,
            });
        }

        let jac = jacobian_fn(&x)?;
        if jac.nrows() != r.len() || jac.ncols() != x.len() {
            return Err(SolverError::Dimension {
                what: format!(
                    "Jacobian is {}x{}, expected {}x{}",
                    jac.nrows(),
                    jac.ncols(),
                    r.len(),
                    x.len()
                ),
            }
            .into());
        }

        // Solve J * dx = -r
        let dx = jac.lu().solve(&(-r.clone())).ok_or_else(|| SolverError::Singular {
            what: format!("Newton Jacobian at iteration {iter}"),
        })?;

        let mut alpha = 1.0;
        let mut x_new = &x + &dx;
        let mut r_new = residual_fn(&x_new)?;
        let mut r_new_norm = r_new.norm();

        for _ in 0..config.max_line_search_iters {
            if config.line_search_beta >= 1.0 || (r_new_norm.is_finite() && r_new_norm < r_norm) {
                break;
            }
            alpha *= config.line_search_beta;
            x_new = &x + alpha * &dx;
            r_new = residual_fn(&x_new)?;
            r_new_norm = r_new.norm();
        }

        if !r_new_norm.is_finite() {
            return Err(SolverError::NonFinite {
                what: format!("Newton residual at iteration {iter}"),
            }
            .into());
        }

        let step_norm = alpha * dx.norm();
        x = x_new;
        r = r_new;
        r_norm = r_new_norm;

        if step_norm <= config.abs_tol + config.rel_tol * x.norm() {
            return Ok(NewtonResult {
                x,
                residual_norm: r_norm,
                iterations: iter + 1,
                converged: true,
            });
        }
    }

    tracing::trace!(
        residual = r_norm,
        iterations = config.max_iterations,
        "Newton iteration did not converge"
    );

    let converged = r_norm <= config.abs_tol;
    Ok(NewtonResult {
        x,
        residual_norm: r_norm,
        iterations: config.max_iterations,
        converged,
    })
}
