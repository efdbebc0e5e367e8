//! Finite difference Jacobians.
//!
//! Generic over the caller's error type so a model's own failures pass
//! through unchanged.

use nalgebra::{DMatrix, DVector};

fn step_size(epsilon: f64, xj: f64) -> f64 {
    epsilon * xj.abs().max(1.0)
}

/// Jacobian by forward differences, reusing a known `f(x)`.
///
/// Column j is `(f(x + dx e_j) - f(x)) / dx` with `dx = epsilon * max(|x_j|, 1)`.
pub fn finite_difference_jacobian<F, E>(
    x: &DVector<f64>,
    f_x: &DVector<f64>,
    mut f: F,
    epsilon: f64,
) -> Result<DMatrix<f64>, E>
where
    F: FnMut(&DVector<f64>) -> Result<DVector<f64>, E>,
{
    let n = x.len();
    let m = f_x.len();
    let mut jac = DMatrix::zeros(m, n);
    let mut x_perturbed = x.clone();

    for j in 0..n {
        let dx = step_size(epsilon, x[j]);
        x_perturbed[j] = x[j] + dx;
        let f_perturbed = f(&x_perturbed)?;
        x_perturbed[j] = x[j];

        jac.set_column(j, &((f_perturbed - f_x) / dx));
    }

    Ok(jac)
}
