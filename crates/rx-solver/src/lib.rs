//! Nonlinear solver building blocks for implicit integration.
//!
//! This crate provides a finite-difference Jacobian and a damped Newton
//! solver over `nalgebra` vectors. Callers bring their own error type as long
//! as it can absorb a [`SolverError`].

pub mod error;
pub mod jacobian;
pub mod newton;

pub use error::{SolverError, SolverResult};
pub use jacobian::finite_difference_jacobian;
pub use newton::{NewtonConfig, NewtonResult, newton_solve};
