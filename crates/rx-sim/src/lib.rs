//! Stiff ODE integration for reactor models.
//!
//! Provides:
//! - `OdeModel` trait with an optional switching function
//! - L-stable SDIRK2 and backward Euler steps with embedded error estimates
//! - Adaptive step control sampling on a fixed output grid
//! - Event location by bisection with a model callback

pub mod error;
pub mod integrator;
pub mod model;
pub mod sim;

// Internal modules
mod events;

// Re-exports for public API
pub use error::{SimError, SimResult};
pub use integrator::{BackwardEuler, Integrator, Sdirk2, StepOutcome};
pub use model::OdeModel;
pub use sim::{EventRecord, IntegrationOptions, IntegrationStats, IntegratorType, Trajectory, integrate};
