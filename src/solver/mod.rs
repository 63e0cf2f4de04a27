//! Stochastic loop solver.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Loop dynamics
//!
//! The single RLC loop is a two-state stochastic differential system in
//! the loop current `i` and capacitor voltage `v`:
//!
//! ```text
//! di/dt = (V_s(t) - v - R i) / L + xi_i
//! dv/dt = i / C                  + xi_v
//! ```
//!
//! where the thermal noise terms follow the fluctuation-dissipation
//! relation (see [`NoiseDynamics`]).
//!
//! Two integration paths are provided:
//! - batch: adaptive Dormand-Prince RK45 on the drift, sampled on a fixed
//!   output grid, with noise applied per accepted step
//! - real-time: fixed-step forward Euler with a callback after every step

mod dynamics;
mod energy;
mod integrator;
mod simulator;
mod trajectory;

pub use dynamics::{NoiseDynamics, RlcParameters, State};
pub use energy::{energy, EnergyLandscape};
pub use integrator::{euler_step, DormandPrince, StepStats};
pub use simulator::{HistoryEntry, RunOptions, Simulator, SimulatorConfig};
pub use trajectory::{mean_std, snr, Sample, SummaryStats, Trajectory};

/// Default relative tolerance of the batch integrator.
pub const DEFAULT_RTOL: f64 = 1e-3;

/// Default absolute tolerance of the batch integrator.
pub const DEFAULT_ATOL: f64 = 1e-6;

/// Default length of down-sampled history trajectories.
pub const DEFAULT_HISTORY_POINTS: usize = 100;
