//! Error types for simulation operations.

use thiserror::Error;

/// Errors encountered during integration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error("Non-physical condition: {what}")]
    NonPhysical { what: String },

    #[error("Integration failed at x = {x}: {what}")]
    Integration { x: f64, what: String },

    #[error("Solver error: {0}")]
    Solver(#[from] rx_solver::SolverError),
}

pub type SimResult<T> = Result<T, SimError>;

impl From<rx_core::CoreError> for SimError {
    fn from(e: rx_core::CoreError) -> Self {
        SimError::InvalidArg {
            what: e.to_string(),
        }
    }
}
