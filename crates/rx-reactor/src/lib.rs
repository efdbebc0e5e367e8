//! Ideal reactor models and the searches built on them.
//!
//! A [`Reactor`] couples a set of shared [`Reaction`]s with one of four
//! topologies (batch, fed-batch, CSTR, plug flow) and integrates the
//! resulting ODE system with `rx-sim`. On top of a plain run it answers two
//! questions: when is steady state reached, and when does a species reach
//! a target conversion.
//!
//! ```no_run
//! use rx_reactor::{Reaction, Reactor, ReactorKind};
//! use std::sync::Arc;
//!
//! let r = Arc::new(Reaction::new("R1", ["A", "B", "C"], [-1.0, -1.0, 1.0], "0.2*A*B")?);
//! let reactor = Reactor::builder(ReactorKind::Batch, 10.0, vec![r])
//!     .initial_concentrations([("A", 1.0), ("B", 2.0), ("C", 0.0)])
//!     .build()?;
//! let run = reactor.run(Some(10.0), false)?;
//! println!("A(10) = {:?}", run.concentration_series("A").and_then(|c| c.last().copied()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod conversion;
pub mod error;
pub mod kind;
pub mod reactor;
pub mod run;
pub mod steady;

// Internal modules
mod ode;

pub use conversion::ConversionPoint;
pub use error::{ReactorError, ReactorResult};
pub use kind::ReactorKind;
pub use reactor::{Reactor, ReactorBuilder};
pub use run::{DerivedRates, ReactorRun, StatePoint};
pub use steady::{SteadyState, SteadyStateOptions};

pub use rx_kinetics::Reaction;
pub use rx_sim::{IntegrationOptions, IntegratorType};
