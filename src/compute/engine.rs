//! Simulated annealing and Metropolis-Hastings sampling.

use rand::Rng;
use rand_distr::StandardNormal;
use tracing::debug;

use super::problem::{CoolingSchedule, Problem, ProblemKind};
use super::result::{AnnealingOutcome, ComputationResult, IterationRecord, SampleOutcome};
use crate::cancel::CancelToken;
use crate::error::{Result, ThermoError};
use crate::seeded_rng;

/// Configuration for one annealing or sampling run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnealingConfig {
    /// Dimension of the search space.
    pub dimensions: usize,
    /// Number of iterations, burn-in included.
    pub iterations: usize,
    /// Initial temperature (optimize and solve).
    pub initial_temperature: f64,
    /// Temperature schedule (optimize and solve).
    pub cooling: CoolingSchedule,
    /// Iterations discarded before samples are kept (sample).
    pub burn_in: usize,
    /// Proposal standard deviation (sample).
    pub step_size: f64,
    /// Seed; `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Start point; `None` draws one from `Normal(0, 1)`.
    pub initial_point: Option<Vec<f64>>,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self::for_optimize()
    }
}

impl AnnealingConfig {
    /// Defaults for minimization: 1000 iterations from T0 = 1000.
    pub fn for_optimize() -> Self {
        Self {
            dimensions: 2,
            iterations: 1000,
            initial_temperature: 1000.0,
            cooling: CoolingSchedule::default(),
            burn_in: 0,
            step_size: 0.1,
            seed: None,
            initial_point: None,
        }
    }

    /// Defaults for root finding: 1000 iterations from T0 = 100.
    pub fn for_solve() -> Self {
        Self {
            initial_temperature: 100.0,
            ..Self::for_optimize()
        }
    }

    /// Defaults for sampling: 5000 iterations, 1000 burn-in, step 0.1.
    pub fn for_sample() -> Self {
        Self {
            iterations: 5000,
            burn_in: 1000,
            ..Self::for_optimize()
        }
    }

    /// Mode defaults for `kind`.
    pub fn for_kind(kind: ProblemKind) -> Self {
        match kind {
            ProblemKind::Optimize => Self::for_optimize(),
            ProblemKind::Solve => Self::for_solve(),
            ProblemKind::Sample => Self::for_sample(),
        }
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_initial_temperature(mut self, temperature: f64) -> Self {
        self.initial_temperature = temperature;
        self
    }

    pub fn with_cooling(mut self, cooling: CoolingSchedule) -> Self {
        self.cooling = cooling;
        self
    }

    pub fn with_burn_in(mut self, burn_in: usize) -> Self {
        self.burn_in = burn_in;
        self
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Start from `point`; also sets the dimension.
    pub fn with_initial_point(mut self, point: Vec<f64>) -> Self {
        self.dimensions = point.len();
        self.initial_point = Some(point);
        self
    }

    fn validate(&self, kind: ProblemKind) -> Result<()> {
        if self.dimensions == 0 {
            return Err(ThermoError::invalid_parameter("dimensions", "must be at least 1"));
        }
        if self.iterations == 0 {
            return Err(ThermoError::invalid_parameter("iterations", "must be at least 1"));
        }
        if let Some(point) = &self.initial_point {
            if point.len() != self.dimensions {
                return Err(ThermoError::invalid_parameter(
                    "initial_point",
                    format!("has {} entries, expected {}", point.len(), self.dimensions),
                ));
            }
        }
        match kind {
            ProblemKind::Optimize | ProblemKind::Solve => {
                if !(self.initial_temperature.is_finite() && self.initial_temperature > 0.0) {
                    return Err(ThermoError::invalid_parameter(
                        "initial_temperature",
                        format!("must be positive, got {}", self.initial_temperature),
                    ));
                }
            }
            ProblemKind::Sample => {
                if !(self.step_size.is_finite() && self.step_size > 0.0) {
                    return Err(ThermoError::invalid_parameter("step_size", "must be positive"));
                }
                if self.burn_in >= self.iterations {
                    return Err(ThermoError::invalid_parameter(
                        "burn_in",
                        format!(
                            "{} leaves no samples out of {} iterations",
                            self.burn_in, self.iterations
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Metropolis acceptance test for a score change `delta` at `temperature`.
///
/// Improvements are always accepted. At zero temperature, or for a
/// non-finite change, only improvements pass.
pub fn metropolis_accept<R: Rng + ?Sized>(delta: f64, temperature: f64, rng: &mut R) -> bool {
    if delta < 0.0 {
        return true;
    }
    if !(temperature > 0.0) || !delta.is_finite() {
        return false;
    }
    rng.gen::<f64>() < (-delta / temperature).exp()
}

/// Shared annealing kernel behind the three problem modes.
#[derive(Debug, Clone, Default)]
pub struct AnnealingEngine {
    config: AnnealingConfig,
}

impl AnnealingEngine {
    pub fn new(config: AnnealingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnnealingConfig {
        &self.config
    }

    /// Run `problem` to completion or until `cancel` fires.
    pub fn run(&self, problem: &Problem, cancel: &CancelToken) -> Result<ComputationResult> {
        let kind = problem.kind();
        let _span = tracing::info_span!("anneal", mode = kind.as_str()).entered();
        self.config.validate(kind)?;

        let result = match problem {
            Problem::Optimize(objective) => {
                ComputationResult::Optimize(self.anneal(|x| objective(x), cancel)?)
            }
            Problem::Solve(residual) => ComputationResult::Solve(
                self.anneal(|x| residual(x).iter().map(|r| r * r).sum(), cancel)?,
            ),
            Problem::Sample(density) => ComputationResult::Sample(self.sample(density, cancel)?),
        };

        debug!(
            acceptance_rate = result.acceptance_rate(),
            best_score = result.best_score(),
            "computation finished"
        );
        Ok(result)
    }

    fn start_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        match &self.config.initial_point {
            Some(point) => point.clone(),
            None => (0..self.config.dimensions)
                .map(|_| rng.sample::<f64, _>(StandardNormal))
                .collect(),
        }
    }

    fn anneal<S>(&self, score: S, cancel: &CancelToken) -> Result<AnnealingOutcome>
    where
        S: Fn(&[f64]) -> f64,
    {
        let config = &self.config;
        let t0 = config.initial_temperature;
        let mut rng = seeded_rng(config.seed);

        let mut current = self.start_point(&mut rng);
        let mut current_score = checked_score(score(&current), 0)?;
        let mut best = current.clone();
        let mut best_score = current_score;
        let mut accepted = 0usize;
        let mut trace = Vec::with_capacity(config.iterations);

        for i in 0..config.iterations {
            if cancel.is_cancelled() {
                return Err(ThermoError::Cancelled { completed: i });
            }

            let temperature = config.cooling.temperature(i, t0);
            let scale = (temperature / t0).max(0.0).sqrt();
            let candidate: Vec<f64> = current
                .iter()
                .map(|x| x + scale * rng.sample::<f64, _>(StandardNormal))
                .collect();
            let candidate_score = checked_score(score(&candidate), i)?;

            if metropolis_accept(candidate_score - current_score, temperature, &mut rng) {
                current = candidate;
                current_score = candidate_score;
                accepted += 1;
                if current_score < best_score {
                    best.clone_from(&current);
                    best_score = current_score;
                }
            }

            trace.push(IterationRecord {
                temperature,
                score: current_score,
                point: current.clone(),
            });
        }

        Ok(AnnealingOutcome {
            best_point: best,
            best_score,
            trace,
            acceptance_rate: accepted as f64 / config.iterations as f64,
        })
    }

    fn sample<D>(&self, density: D, cancel: &CancelToken) -> Result<SampleOutcome>
    where
        D: Fn(&[f64]) -> f64,
    {
        let config = &self.config;
        let mut rng = seeded_rng(config.seed);

        let mut current = self.start_point(&mut rng);
        let mut current_density = checked_density(density(&current), 0)?;
        let kept = config.iterations - config.burn_in;
        let mut samples = Vec::with_capacity(kept);
        let mut densities = Vec::with_capacity(kept);
        let mut accepted = 0usize;

        for i in 0..config.iterations {
            if cancel.is_cancelled() {
                return Err(ThermoError::Cancelled { completed: i });
            }

            let proposal: Vec<f64> = current
                .iter()
                .map(|x| x + config.step_size * rng.sample::<f64, _>(StandardNormal))
                .collect();
            let proposal_density = checked_density(density(&proposal), i)?;

            // Out of a zero-density region every move is taken.
            let accept = if current_density == 0.0 {
                true
            } else {
                rng.gen::<f64>() < proposal_density / current_density
            };
            if accept {
                current = proposal;
                current_density = proposal_density;
                accepted += 1;
            }

            if i >= config.burn_in {
                samples.push(current.clone());
                densities.push(current_density);
            }
        }

        Ok(SampleOutcome {
            samples,
            densities,
            acceptance_rate: accepted as f64 / config.iterations as f64,
        })
    }
}

fn checked_score(score: f64, iteration: usize) -> Result<f64> {
    if score.is_nan() {
        Err(ThermoError::numerical("annealing score", iteration as f64))
    } else {
        Ok(score)
    }
}

fn checked_density(density: f64, iteration: usize) -> Result<f64> {
    if density.is_nan() || density < 0.0 {
        Err(ThermoError::numerical("target density", iteration as f64))
    } else {
        Ok(density)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sum_of_squares(x: &[f64]) -> f64 {
        x.iter().map(|v| v * v).sum()
    }

    #[test]
    fn test_optimize_convex_converges() {
        for seed in 0..20 {
            let config = AnnealingConfig::for_optimize()
                .with_initial_temperature(1.0)
                .with_seed(seed);
            let result = AnnealingEngine::new(config)
                .run(&Problem::optimize(sum_of_squares), &CancelToken::new())
                .unwrap();
            let best = result.best_score().unwrap();
            assert!(best < 1e-3, "seed {seed}: best score {best}");
            let outcome = result.annealing().unwrap();
            assert_eq!(outcome.trace.len(), 1000);
            assert!(outcome.scores().iter().all(|&s| s >= best));
        }
    }

    #[test]
    fn test_solve_finds_circle_diagonal_intersection() {
        let problem = Problem::solve(|x| vec![x[0] * x[0] + x[1] * x[1] - 1.0, x[0] - x[1]]);
        for seed in 0..10 {
            let config = AnnealingConfig::for_solve().with_seed(seed);
            let result = AnnealingEngine::new(config).run(&problem, &CancelToken::new()).unwrap();
            assert!(result.best_score().unwrap() < 0.05);
            let x = result.best_point().unwrap();
            assert_abs_diff_eq!(x[0].abs(), std::f64::consts::FRAC_1_SQRT_2, epsilon = 0.15);
        }
    }

    #[test]
    fn test_sampler_recovers_gaussian_moments() {
        let config = AnnealingConfig::for_sample()
            .with_iterations(20_000)
            .with_burn_in(2_000)
            .with_step_size(1.0)
            .with_seed(11);
        let problem = Problem::sample(|x| (-0.5 * sum_of_squares(x)).exp());
        let result = AnnealingEngine::new(config).run(&problem, &CancelToken::new()).unwrap();
        let outcome = result.samples().unwrap();
        assert_eq!(outcome.samples.len(), 18_000);
        assert_eq!(outcome.densities.len(), 18_000);
        for (mean, std) in outcome.mean().into_iter().zip(outcome.std()) {
            assert_abs_diff_eq!(mean, 0.0, epsilon = 0.15);
            assert_abs_diff_eq!(std, 1.0, epsilon = 0.15);
        }
        assert!(result.acceptance_rate() > 0.2 && result.acceptance_rate() < 0.9);
    }

    #[test]
    fn test_zero_initial_temperature_rejected() {
        let config = AnnealingConfig::for_optimize().with_initial_temperature(0.0);
        let err = AnnealingEngine::new(config)
            .run(&Problem::optimize(sum_of_squares), &CancelToken::new())
            .unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_burn_in_must_leave_samples() {
        let config = AnnealingConfig::for_sample().with_iterations(100).with_burn_in(100);
        let problem = Problem::sample(|_| 1.0);
        assert!(AnnealingEngine::new(config).run(&problem, &CancelToken::new()).is_err());
    }

    #[test]
    fn test_nan_objective_is_numerical_failure() {
        let problem = Problem::optimize(|x| if x[0] > 0.0 { f64::NAN } else { 0.0 });
        let config = AnnealingConfig::for_optimize()
            .with_initial_point(vec![-1.0])
            .with_seed(2);
        let err = AnnealingEngine::new(config).run(&problem, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, ThermoError::NumericalFailure { .. }));
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = AnnealingEngine::new(AnnealingConfig::for_optimize().with_seed(1))
            .run(&Problem::optimize(sum_of_squares), &cancel)
            .unwrap_err();
        assert!(matches!(err, ThermoError::Cancelled { completed: 0 }));
    }

    #[test]
    fn test_metropolis_rules() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(metropolis_accept(-1.0, 0.0, &mut rng));
        assert!(!metropolis_accept(1e-9, 0.0, &mut rng));
        assert!(!metropolis_accept(f64::INFINITY, 10.0, &mut rng));
        assert!(!metropolis_accept(f64::NAN, 10.0, &mut rng));
        let accepted = (0..10_000)
            .filter(|_| metropolis_accept(1.0, 1.0, &mut rng))
            .count() as f64;
        assert_abs_diff_eq!(accepted / 10_000.0, (-1.0_f64).exp(), epsilon = 0.02);
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let run = || {
            AnnealingEngine::new(AnnealingConfig::for_solve().with_seed(99))
                .run(
                    &Problem::solve(|x| vec![x[0] + x[1] - 2.0]),
                    &CancelToken::new(),
                )
                .unwrap()
        };
        assert_eq!(run(), run());
    }
}
