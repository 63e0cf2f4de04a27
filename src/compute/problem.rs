//! Problem definitions and cooling schedules.

use std::fmt;

use serde::Serialize;

/// Scalar objective to minimize.
pub type Objective = Box<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// Residual vector whose squared norm is driven to zero.
pub type Residual = Box<dyn Fn(&[f64]) -> Vec<f64> + Send + Sync>;

/// Unnormalized, non-negative target density.
pub type Density = Box<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// What the annealing engine is asked to do.
pub enum Problem {
    /// Minimize `f(x)`.
    Optimize(Objective),
    /// Find `x` with `r(x) = 0` by minimizing `sum(r(x)^2)`.
    Solve(Residual),
    /// Draw samples from the density `p(x)` with a Metropolis-Hastings
    /// chain.
    Sample(Density),
}

impl Problem {
    pub fn optimize<F>(objective: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self::Optimize(Box::new(objective))
    }

    pub fn solve<F>(residual: F) -> Self
    where
        F: Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
    {
        Self::Solve(Box::new(residual))
    }

    pub fn sample<F>(density: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self::Sample(Box::new(density))
    }

    pub fn kind(&self) -> ProblemKind {
        match self {
            Self::Optimize(_) => ProblemKind::Optimize,
            Self::Solve(_) => ProblemKind::Solve,
            Self::Sample(_) => ProblemKind::Sample,
        }
    }

    /// Short mode name for logs.
    pub fn mode(&self) -> &'static str {
        self.kind().as_str()
    }
}

impl fmt::Debug for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Problem::{:?}(..)", self.kind())
    }
}

/// Problem mode without its callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemKind {
    Optimize,
    Solve,
    Sample,
}

impl ProblemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimize => "optimize",
            Self::Solve => "solve",
            Self::Sample => "sample",
        }
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Temperature as a function of iteration and initial temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoolingSchedule {
    /// `T0 * rate^k`
    Geometric { rate: f64 },
    /// `T0 / (1 + ln(1 + k))`
    Logarithmic,
    /// Caller-supplied schedule
    Custom(fn(usize, f64) -> f64),
}

impl Default for CoolingSchedule {
    fn default() -> Self {
        Self::Geometric { rate: 0.99 }
    }
}

impl CoolingSchedule {
    /// Temperature at `iteration`.
    pub fn temperature(&self, iteration: usize, initial: f64) -> f64 {
        match *self {
            Self::Geometric { rate } => initial * rate.powf(iteration as f64),
            Self::Logarithmic => initial / (1.0 + (1.0 + iteration as f64).ln()),
            Self::Custom(schedule) => schedule(iteration, initial),
        }
    }
}
