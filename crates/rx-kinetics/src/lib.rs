//! Reaction kinetics for reactor-sim.
//!
//! Provides:
//! - `RateExpression`: restricted, side-effect free rate-law parser and evaluator
//! - `Reaction`: named reaction with stoichiometry and a rate law
//! - `ReactionNetwork`: species ordering, stoichiometric matrix, bound rate laws

pub mod error;
pub mod expression;
pub mod network;
pub mod reaction;

pub use error::{KineticsError, KineticsResult};
pub use expression::{BoundRate, Concentrations, RateExpression};
pub use network::ReactionNetwork;
pub use reaction::Reaction;
