//! Circuit representation and validation.
//!
//! This module provides the internal representation of a stochastic RLC
//! loop. The [`Circuit`] struct owns its components, records which
//! component plays each loop role and keeps the advisory coupling matrix.

mod component;
pub mod config;
mod coupling;
mod network;
pub mod presets;
mod types;
mod validate;

pub use component::Component;
pub use config::{load_circuit, CircuitConfig, ComponentSpec};
pub use coupling::CouplingMatrix;
pub use network::Circuit;
pub use types::*;
pub use validate::validate_circuit;
