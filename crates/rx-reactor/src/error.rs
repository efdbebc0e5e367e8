//! Error types for reactor operations.

use thiserror::Error;

/// Errors raised by reactor construction, runs and searches.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReactorError {
    #[error("Configuration error: {what}")]
    Configuration { what: String },

    #[error("Symbol '{symbol}' in rate law '{expression}' is not a species of the reaction")]
    UnknownSymbol { symbol: String, expression: String },

    #[error("Integration failed at x = {x}: {what}")]
    Integration { x: f64, what: String },

    #[error(
        "Steady state not reached after {iterations} iterations \
         (horizon {horizon}, max transformation rate {max_rate:e})"
    )]
    SteadyStateNotReached {
        iterations: usize,
        horizon: f64,
        max_rate: f64,
    },

    #[error(
        "Conversion {target} of '{species}' is unreachable; \
         steady-state conversion is {achievable}"
    )]
    ConversionUnreachable {
        species: String,
        target: f64,
        achievable: f64,
    },
}

pub type ReactorResult<T> = Result<T, ReactorError>;

impl ReactorError {
    pub(crate) fn config(what: impl Into<String>) -> Self {
        ReactorError::Configuration { what: what.into() }
    }
}

impl From<rx_kinetics::KineticsError> for ReactorError {
    fn from(e: rx_kinetics::KineticsError) -> Self {
        match e {
            rx_kinetics::KineticsError::UnknownSymbol { symbol, expression } => {
                ReactorError::UnknownSymbol { symbol, expression }
            }
            other => ReactorError::Configuration {
                what: other.to_string(),
            },
        }
    }
}

impl From<rx_sim::SimError> for ReactorError {
    fn from(e: rx_sim::SimError) -> Self {
        match e {
            rx_sim::SimError::Integration { x, what } => ReactorError::Integration { x, what },
            other => ReactorError::Configuration {
                what: other.to_string(),
            },
        }
    }
}

impl From<rx_core::CoreError> for ReactorError {
    fn from(e: rx_core::CoreError) -> Self {
        ReactorError::Configuration {
            what: e.to_string(),
        }
    }
}
