//! Thermodynamic computation.
//!
//! One annealing kernel serves three problem modes:
//!
//! - [`Problem::Optimize`]: minimize an objective under a cooling schedule
//! - [`Problem::Solve`]: minimize the squared norm of a residual vector
//! - [`Problem::Sample`]: run a fixed-step Metropolis-Hastings chain on a
//!   target density (no cooling)
//!
//! Candidate points are proposed as `x + Normal(0, sqrt(T / T0))` per
//! dimension and accepted by the Metropolis rule.

mod engine;
mod problem;
mod result;

pub use engine::{metropolis_accept, AnnealingConfig, AnnealingEngine};
pub use problem::{CoolingSchedule, Density, Objective, Problem, ProblemKind, Residual};
pub use result::{AnnealingOutcome, ComputationResult, IterationRecord, SampleOutcome};
