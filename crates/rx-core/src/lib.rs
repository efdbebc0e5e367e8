//! rx-core: shared foundation for reactor-sim.
//!
//! Contains:
//! - numeric (Real, validators, sampling helpers)
//! - error (shared error types)

pub mod error;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use numeric::*;
