//! Parallel parameter sweeps and Monte Carlo batches.

use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::grid::{Overrides, ParameterGrid, ParameterVariations};
use super::record::{RunMetrics, RunStatus, RunTag, SweepRecord};
use crate::cancel::CancelToken;
use crate::circuit::Circuit;
use crate::error::{Result, ThermoError};
use crate::seeded_rng;
use crate::solver::{RunOptions, Simulator, SimulatorConfig};

/// Configuration for ensemble batches.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleConfig {
    /// Worker threads; defaults to the available parallelism.
    pub num_workers: usize,
    /// Seed of the generator drawing Monte Carlo perturbations.
    pub seed: Option<u64>,
    /// Configuration of every per-unit simulator.
    pub simulator: SimulatorConfig,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            num_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            seed: None,
            simulator: SimulatorConfig::default(),
        }
    }
}

impl EnsembleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_simulator(mut self, simulator: SimulatorConfig) -> Self {
        self.simulator = simulator;
        self
    }
}

/// One independent simulation of a batch.
struct WorkUnit {
    overrides: Overrides,
    tag: RunTag,
    seed: u64,
}

/// Fans simulations of a base circuit out over a worker pool.
///
/// Every unit of work simulates its own clone of the base circuit with its
/// overrides applied and its own seed, so units share no state. Records
/// come back in submission order.
pub struct EnsembleRunner {
    base: Circuit,
    config: EnsembleConfig,
    pool: rayon::ThreadPool,
}

impl EnsembleRunner {
    pub fn new(base: Circuit, config: EnsembleConfig) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_workers.max(1))
            .thread_name(|i| format!("ensemble-{i}"))
            .build()
            .map_err(|e| ThermoError::WorkerPool {
                message: e.to_string(),
            })?;
        Ok(Self { base, config, pool })
    }

    pub fn base_circuit(&self) -> &Circuit {
        &self.base
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// Simulate every combination of `grid` `repeats` times.
    ///
    /// Repetition `r` of each combination uses seed `r`. Returns
    /// `combinations * repeats` records, repetitions of one combination
    /// adjacent.
    pub fn parameter_sweep(
        &self,
        grid: &ParameterGrid,
        duration: f64,
        dt: f64,
        repeats: usize,
        cancel: &CancelToken,
    ) -> Result<Vec<SweepRecord>> {
        check_run(duration, dt)?;
        self.check_names(grid.names())?;

        let units: Vec<WorkUnit> = grid
            .combinations()
            .into_iter()
            .flat_map(|overrides| {
                (0..repeats).map(move |rep| WorkUnit {
                    overrides: overrides.clone(),
                    tag: RunTag::Repetition(rep),
                    seed: rep as u64,
                })
            })
            .collect();

        let _span = tracing::info_span!("parameter_sweep", units = units.len()).entered();
        Ok(self.run_units(units, duration, dt, cancel))
    }

    /// Run `num_simulations` simulations with Gaussian perturbed nominal
    /// values.
    ///
    /// `variations` defaults to every component at its nominal value with a
    /// 10% deviation. Perturbations are drawn up front from the configured
    /// seed; simulation `i` runs with seed `i`.
    pub fn monte_carlo_analysis(
        &self,
        num_simulations: usize,
        duration: f64,
        dt: f64,
        variations: Option<&ParameterVariations>,
        cancel: &CancelToken,
    ) -> Result<Vec<SweepRecord>> {
        check_run(duration, dt)?;
        let defaults;
        let variations = match variations {
            Some(v) => v,
            None => {
                defaults = ParameterVariations::from_circuit(&self.base);
                &defaults
            }
        };
        self.check_names(variations.names())?;

        let mut rng = seeded_rng(self.config.seed);
        let units = (0..num_simulations)
            .map(|i| -> Result<WorkUnit> {
                Ok(WorkUnit {
                    overrides: variations.draw(&mut rng)?,
                    tag: RunTag::Simulation(i),
                    seed: i as u64,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let _span = tracing::info_span!("monte_carlo", units = units.len()).entered();
        Ok(self.run_units(units, duration, dt, cancel))
    }

    fn check_names<'a>(&self, mut names: impl Iterator<Item = &'a str>) -> Result<()> {
        match names.find(|name| self.base.find(name).is_none()) {
            Some(name) => Err(ThermoError::ComponentNotFound {
                name: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn run_units(&self, units: Vec<WorkUnit>, duration: f64, dt: f64, cancel: &CancelToken) -> Vec<SweepRecord> {
        let start = Instant::now();
        debug!(workers = self.pool.current_num_threads(), "dispatching units");

        let records: Vec<SweepRecord> = self.pool.install(|| {
            units
                .into_par_iter()
                .map(|unit| self.run_unit(unit, duration, dt, cancel))
                .collect()
        });

        let failed = records
            .iter()
            .filter(|r| matches!(r.status, RunStatus::Failed { .. }))
            .count();
        let cancelled = records.iter().filter(|r| r.status == RunStatus::Cancelled).count();
        info!(
            units = records.len(),
            failed,
            cancelled,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "batch complete"
        );
        records
    }

    fn run_unit(&self, unit: WorkUnit, duration: f64, dt: f64, cancel: &CancelToken) -> SweepRecord {
        let WorkUnit { overrides, tag, seed } = unit;
        if cancel.is_cancelled() {
            return SweepRecord {
                parameters: overrides,
                tag,
                metrics: RunMetrics::default(),
                status: RunStatus::Cancelled,
            };
        }

        match self.simulate_unit(&overrides, duration, dt, seed) {
            Ok(metrics) => SweepRecord {
                parameters: overrides,
                tag,
                metrics,
                status: RunStatus::Completed,
            },
            Err(e) => {
                warn!(%tag, parameters = ?overrides, error = %e, "ensemble unit failed");
                SweepRecord {
                    parameters: overrides,
                    tag,
                    metrics: RunMetrics::default(),
                    status: RunStatus::Failed {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }

    fn simulate_unit(&self, overrides: &[(String, f64)], duration: f64, dt: f64, seed: u64) -> Result<RunMetrics> {
        let mut circuit = self.base.clone();
        circuit.apply_overrides(overrides)?;
        let mut simulator = Simulator::with_config(circuit, self.config.simulator.clone());
        let trajectory = simulator.simulate(duration, dt, &RunOptions::new().with_seed(seed))?;
        Ok(RunMetrics::from_trajectory(&trajectory))
    }
}

fn check_run(duration: f64, dt: f64) -> Result<()> {
    if !(duration.is_finite() && duration > 0.0) {
        return Err(ThermoError::invalid_parameter("duration", "must be positive"));
    }
    if !(dt.is_finite() && dt > 0.0) {
        return Err(ThermoError::invalid_parameter("dt", "must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{presets, Component, ComponentKind};

    fn runner(circuit: Circuit) -> EnsembleRunner {
        EnsembleRunner::new(circuit, EnsembleConfig::new().with_workers(2).with_seed(17)).unwrap()
    }

    #[test]
    fn test_sweep_cardinality_and_tags() {
        let grid = ParameterGrid::new()
            .with_axis("R1", vec![500.0, 1000.0])
            .with_axis("V1", vec![1.0, 2.0, 5.0]);
        let records = runner(presets::example_circuit())
            .parameter_sweep(&grid, 0.005, 1e-4, 3, &CancelToken::new())
            .unwrap();

        assert_eq!(records.len(), 2 * 3 * 3);
        for (k, record) in records.iter().enumerate() {
            let combo = &grid.combinations()[k / 3];
            assert_eq!(&record.parameters, combo);
            assert_eq!(record.tag, RunTag::Repetition(k % 3));
            assert!(record.is_completed());
            assert!(record.metrics.voltage_mean > 0.0);
        }
    }

    #[test]
    fn test_sweep_is_reproducible() {
        let grid = ParameterGrid::new().with_axis("C1", vec![1e-6, 2e-6]);
        let runner = runner(presets::example_circuit());
        let a = runner.parameter_sweep(&grid, 0.005, 1e-4, 2, &CancelToken::new()).unwrap();
        let b = runner.parameter_sweep(&grid, 0.005, 1e-4, 2, &CancelToken::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unit_failure_does_not_abort_batch() {
        let mut circuit = Circuit::new(300.0).unwrap();
        for (name, kind, value) in [
            ("R1", ComponentKind::Resistor, 1000.0),
            ("L1", ComponentKind::Inductor, 0.1),
            ("V1", ComponentKind::Source, 5.0),
        ] {
            circuit
                .add_component(Component::ideal(name, kind, value).unwrap())
                .unwrap();
        }
        let grid = ParameterGrid::new().with_axis("R1", vec![10.0, 20.0]);
        let records = runner(circuit)
            .parameter_sweep(&grid, 0.005, 1e-4, 2, &CancelToken::new())
            .unwrap();
        assert_eq!(records.len(), 4);
        for record in records {
            assert!(matches!(record.status, RunStatus::Failed { .. }));
            assert_eq!(record.metrics, RunMetrics::default());
        }
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let grid = ParameterGrid::new().with_axis("R9", vec![1.0]);
        let err = runner(presets::example_circuit())
            .parameter_sweep(&grid, 0.005, 1e-4, 1, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, ThermoError::ComponentNotFound { .. }));
    }

    #[test]
    fn test_monte_carlo_ids_and_seeding() {
        let runner = runner(presets::example_circuit());
        let variations = ParameterVariations::new().with("R1", 1000.0, 100.0);
        let records = runner
            .monte_carlo_analysis(6, 0.005, 1e-4, Some(&variations), &CancelToken::new())
            .unwrap();
        assert_eq!(records.len(), 6);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.tag, RunTag::Simulation(i));
            assert_eq!(record.parameters.len(), 1);
            assert!(record.parameter("R1").is_some());
        }

        // Same master seed, same perturbations.
        let again = runner
            .monte_carlo_analysis(6, 0.005, 1e-4, Some(&variations), &CancelToken::new())
            .unwrap();
        assert_eq!(records, again);
    }

    #[test]
    fn test_monte_carlo_default_variations() {
        let records = runner(presets::example_circuit())
            .monte_carlo_analysis(3, 0.002, 1e-4, None, &CancelToken::new())
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].parameters.len(), 4);
    }

    #[test]
    fn test_cancelled_batch_marks_every_unit() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let grid = ParameterGrid::new().with_axis("R1", vec![1.0, 2.0, 3.0]);
        let records = runner(presets::example_circuit())
            .parameter_sweep(&grid, 0.005, 1e-4, 1, &cancel)
            .unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.status == RunStatus::Cancelled));
    }
}
