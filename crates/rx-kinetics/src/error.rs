//! Error types for kinetics operations.

use thiserror::Error;

/// Errors raised while building or evaluating reactions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KineticsError {
    #[error("Invalid reaction '{reaction}': {what}")]
    InvalidReaction { reaction: String, what: String },

    #[error("Rate law parse error at column {position}: {what}")]
    Parse { position: usize, what: String },

    #[error("Symbol '{symbol}' in rate law '{expression}' is not a species of the reaction")]
    UnknownSymbol { symbol: String, expression: String },

    #[error("Missing {what} for species '{species}'")]
    MissingSpecies { species: String, what: String },

    #[error("Invalid network: {what}")]
    InvalidNetwork { what: String },
}

pub type KineticsResult<T> = Result<T, KineticsError>;
