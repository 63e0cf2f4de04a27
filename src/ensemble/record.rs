//! Per-run ensemble output rows.

use std::fmt;

use serde::Serialize;

use crate::solver::{SummaryStats, Trajectory};

/// Which repetition or simulation of a batch a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTag {
    /// Repetition index within a sweep combination (also the seed)
    Repetition(usize),
    /// Monte Carlo simulation id (also the seed)
    Simulation(usize),
}

impl RunTag {
    pub fn index(&self) -> usize {
        match *self {
            Self::Repetition(i) | Self::Simulation(i) => i,
        }
    }
}

impl fmt::Display for RunTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Repetition(i) => write!(f, "repetition {i}"),
            Self::Simulation(i) => write!(f, "simulation {i}"),
        }
    }
}

/// Outcome of one unit of work.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// The simulation returned an error; metrics are zeroed
    Failed { reason: String },
    /// Skipped because the batch was cancelled; metrics are zeroed
    Cancelled,
}

/// Summary statistics of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunMetrics {
    pub current_mean: f64,
    pub current_std: f64,
    pub voltage_mean: f64,
    pub voltage_std: f64,
    /// `|mean| / std` of the current, infinite for zero deviation
    pub snr_current: f64,
    /// `|mean| / std` of the voltage, infinite for zero deviation
    pub snr_voltage: f64,
}

impl RunMetrics {
    pub fn from_summary(stats: &SummaryStats) -> Self {
        Self {
            current_mean: stats.current_mean,
            current_std: stats.current_std,
            voltage_mean: stats.voltage_mean,
            voltage_std: stats.voltage_std,
            snr_current: stats.current_snr(),
            snr_voltage: stats.voltage_snr(),
        }
    }

    pub fn from_trajectory(trajectory: &Trajectory) -> Self {
        Self::from_summary(&trajectory.summary())
    }
}

/// One row of a sweep or Monte Carlo batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRecord {
    /// Nominal value overrides the run used
    pub parameters: Vec<(String, f64)>,
    pub tag: RunTag,
    pub metrics: RunMetrics,
    #[serde(flatten)]
    pub status: RunStatus,
}

impl SweepRecord {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Value of an overridden parameter.
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, value)| value)
    }
}
