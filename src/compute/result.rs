//! Annealing and sampling outcomes.

use serde::Serialize;

use super::problem::ProblemKind;

/// State of an annealing run after one iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    pub temperature: f64,
    /// Score of the current (not best) point
    pub score: f64,
    pub point: Vec<f64>,
}

/// Outcome of an optimize or solve run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnealingOutcome {
    /// Lowest-scoring point ever accepted (or the start point)
    pub best_point: Vec<f64>,
    pub best_score: f64,
    /// One record per iteration
    pub trace: Vec<IterationRecord>,
    pub acceptance_rate: f64,
}

impl AnnealingOutcome {
    pub fn temperatures(&self) -> Vec<f64> {
        self.trace.iter().map(|r| r.temperature).collect()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.trace.iter().map(|r| r.score).collect()
    }
}

/// Outcome of a sampling run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleOutcome {
    /// Chain state at every post-burn-in iteration
    pub samples: Vec<Vec<f64>>,
    /// Density at each sample
    pub densities: Vec<f64>,
    pub acceptance_rate: f64,
}

impl SampleOutcome {
    /// Per-dimension sample mean.
    pub fn mean(&self) -> Vec<f64> {
        let dims = self.samples.first().map_or(0, Vec::len);
        let n = self.samples.len() as f64;
        (0..dims)
            .map(|d| self.samples.iter().map(|s| s[d]).sum::<f64>() / n)
            .collect()
    }

    /// Per-dimension population standard deviation.
    pub fn std(&self) -> Vec<f64> {
        let n = self.samples.len() as f64;
        self.mean()
            .iter()
            .enumerate()
            .map(|(d, m)| {
                let var = self.samples.iter().map(|s| (s[d] - m).powi(2)).sum::<f64>() / n;
                var.sqrt()
            })
            .collect()
    }
}

/// Result of a thermodynamic computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "problem", rename_all = "lowercase")]
pub enum ComputationResult {
    Optimize(AnnealingOutcome),
    Solve(AnnealingOutcome),
    Sample(SampleOutcome),
}

impl ComputationResult {
    pub fn kind(&self) -> ProblemKind {
        match self {
            Self::Optimize(_) => ProblemKind::Optimize,
            Self::Solve(_) => ProblemKind::Solve,
            Self::Sample(_) => ProblemKind::Sample,
        }
    }

    /// Annealing outcome for optimize and solve runs.
    pub fn annealing(&self) -> Option<&AnnealingOutcome> {
        match self {
            Self::Optimize(outcome) | Self::Solve(outcome) => Some(outcome),
            Self::Sample(_) => None,
        }
    }

    pub fn samples(&self) -> Option<&SampleOutcome> {
        match self {
            Self::Sample(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn best_point(&self) -> Option<&[f64]> {
        self.annealing().map(|o| o.best_point.as_slice())
    }

    pub fn best_score(&self) -> Option<f64> {
        self.annealing().map(|o| o.best_score)
    }

    pub fn acceptance_rate(&self) -> f64 {
        match self {
            Self::Optimize(o) | Self::Solve(o) => o.acceptance_rate,
            Self::Sample(s) => s.acceptance_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sample_moments() {
        let outcome = SampleOutcome {
            samples: vec![vec![1.0, 0.0], vec![3.0, 0.0]],
            densities: vec![0.5, 0.5],
            acceptance_rate: 1.0,
        };
        assert_eq!(outcome.mean(), vec![2.0, 0.0]);
        assert_relative_eq!(outcome.std()[0], 1.0);
        let result = ComputationResult::Sample(outcome);
        assert!(result.best_point().is_none());
        assert_eq!(result.kind(), ProblemKind::Sample);
    }
}
