//! Error types for solver operations.

use thiserror::Error;

/// Errors that can occur inside the nonlinear solver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Invalid solver configuration: {what}")]
    InvalidConfig { what: String },

    #[error("Singular matrix: {what}")]
    Singular { what: String },

    #[error("Dimension mismatch: {what}")]
    Dimension { what: String },

    #[error("Non-finite value in {what}")]
    NonFinite { what: String },
}

pub type SolverResult<T> = Result<T, SolverError>;
