//! Ensemble runs: parameter sweeps and Monte Carlo analysis.

mod grid;
mod record;
mod runner;

pub use grid::{Overrides, ParameterGrid, ParameterVariations};
pub use record::{RunMetrics, RunStatus, RunTag, SweepRecord};
pub use runner::{EnsembleConfig, EnsembleRunner};
