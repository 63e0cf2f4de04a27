//! Main simulator interface.

use std::ops::ControlFlow;

use tracing::debug;

use crate::cancel::CancelToken;
use crate::circuit::Circuit;
use crate::compute::{AnnealingConfig, AnnealingEngine, ComputationResult, Problem};
use crate::error::{Result, ThermoError};
use crate::seeded_rng;

use super::dynamics::{NoiseDynamics, RlcParameters, State};
use super::energy::EnergyLandscape;
use super::integrator::{euler_step, DormandPrince, StepStats};
use super::trajectory::{Sample, Trajectory};
use super::{DEFAULT_ATOL, DEFAULT_HISTORY_POINTS, DEFAULT_RTOL};

/// Largest number of samples reserved up front by a real-time run.
const REALTIME_RESERVE: usize = 1 << 16;

/// Configuration for the simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Relative tolerance of the adaptive integrator.
    pub rtol: f64,
    /// Absolute tolerance of the adaptive integrator.
    pub atol: f64,
    /// Largest internal step of the adaptive integrator (seconds).
    pub max_step: f64,
    /// Angular frequency of the source in rad/s; 0 drives the loop with DC.
    pub source_frequency: f64,
    /// Target length of the down-sampled trajectories kept in the history.
    pub history_points: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            rtol: DEFAULT_RTOL,
            atol: DEFAULT_ATOL,
            max_step: f64::INFINITY,
            source_frequency: 0.0,
            history_points: DEFAULT_HISTORY_POINTS,
        }
    }
}

impl SimulatorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the integration tolerances.
    ///
    /// The drift of a strongly damped loop is smooth, so the defaults
    /// (1e-3 relative, 1e-6 absolute) are usually enough. Tighten them for
    /// energy bookkeeping on lightly damped circuits.
    pub fn with_tolerances(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    /// Cap the internal step of the adaptive integrator.
    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }

    /// Drive the loop with `V sin(omega t)` instead of DC.
    pub fn with_source_frequency(mut self, omega: f64) -> Self {
        self.source_frequency = omega;
        self
    }

    /// Set the history subsample target.
    pub fn with_history_points(mut self, points: usize) -> Self {
        self.history_points = points;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.rtol > 0.0 && self.atol > 0.0) {
            return Err(ThermoError::invalid_parameter(
                "tolerance",
                "rtol and atol must be positive",
            ));
        }
        if !(self.max_step > 0.0) {
            return Err(ThermoError::invalid_parameter("max_step", "must be positive"));
        }
        if !self.source_frequency.is_finite() {
            return Err(ThermoError::invalid_parameter("source_frequency", "must be finite"));
        }
        Ok(())
    }
}

/// Per-run options.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunOptions {
    /// State at t = 0.
    pub initial_state: State,
    /// Seed for the run's generator; `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Record the energy function at every sample and keep a history entry.
    pub capture_energy: bool,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_state(mut self, current: f64, voltage: f64) -> Self {
        self.initial_state = State::new(current, voltage);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_energy(mut self, capture: bool) -> Self {
        self.capture_energy = capture;
        self
    }
}

/// Down-sampled record of one energy-capturing run.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub parameters: RlcParameters,
    pub samples: Vec<Sample>,
}

/// The stochastic circuit simulator.
pub struct Simulator {
    /// The circuit being simulated
    circuit: Circuit,
    config: SimulatorConfig,
    /// Runs that captured energy, oldest first
    history: Vec<HistoryEntry>,
    /// Parameters resolved by the most recent run
    last_parameters: Option<RlcParameters>,
}

impl Simulator {
    /// Create a new simulator for the given circuit with default configuration.
    pub fn new(circuit: Circuit) -> Self {
        Self::with_config(circuit, SimulatorConfig::default())
    }

    /// Create a new simulator for the given circuit with custom configuration.
    pub fn with_config(circuit: Circuit, config: SimulatorConfig) -> Self {
        Self {
            circuit,
            config,
            history: Vec::new(),
            last_parameters: None,
        }
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// Mutable access for calibration and characterization between runs.
    pub fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    pub fn into_circuit(self) -> Circuit {
        self.circuit
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Parameters the most recent run was integrated with.
    pub fn last_parameters(&self) -> Option<&RlcParameters> {
        self.last_parameters.as_ref()
    }

    /// Integrate the loop from t = 0 to `duration`, sampling every `dt`.
    ///
    /// R, L, C and V are drawn once at the start of the run. The drift is
    /// integrated with adaptive RK45 landing on every checkpoint; thermal
    /// noise is added after each accepted internal step, scaled by that
    /// step's size.
    pub fn simulate(&mut self, duration: f64, dt: f64, options: &RunOptions) -> Result<Trajectory> {
        let _span = tracing::debug_span!("simulate", duration, dt).entered();
        self.config.validate()?;
        let points = grid_len(duration, dt)?;
        check_initial_state(options.initial_state)?;

        let mut rng = seeded_rng(options.seed);
        let params = RlcParameters::resolve(&self.circuit, &mut rng)?;
        let dynamics = NoiseDynamics::new(params, self.circuit.temperature(), self.config.source_frequency);
        let capture = options.capture_energy;
        let record = |time: f64, state: State| Sample {
            time,
            current: state.current,
            voltage: state.voltage,
            energy: capture.then(|| params.energy(state)),
        };

        let mut stepper = DormandPrince::new(self.config.rtol, self.config.atol, self.config.max_step);
        let drift = |t: f64, state: State| dynamics.drift(t, state);
        let mut add_noise = |_t: f64, h: f64, state: &mut State| {
            *state = *state + dynamics.sample_noise(&mut rng) * h;
        };

        let mut samples = Vec::with_capacity(points);
        let mut state = options.initial_state;
        let mut t = 0.0;
        samples.push(record(t, state));
        for k in 1..points {
            let t_next = k as f64 * dt;
            state = stepper.advance(&drift, t, state, t_next, &mut add_noise)?;
            t = t_next;
            samples.push(record(t, state));
        }

        let stats = stepper.stats();
        debug!(
            points,
            accepted = stats.accepted,
            rejected = stats.rejected,
            "batch integration finished"
        );
        Ok(self.finish_run(samples, params, stats, capture))
    }

    /// Step the loop with forward Euler at fixed `dt`, calling `on_step`
    /// after every step.
    ///
    /// Each sample is stamped with the time at the end of its step and
    /// always carries the energy. Returning [`ControlFlow::Break`] from
    /// the callback ends the run; the samples produced so far are
    /// returned.
    pub fn simulate_realtime<F>(
        &mut self,
        duration: f64,
        dt: f64,
        options: &RunOptions,
        mut on_step: F,
    ) -> Result<Trajectory>
    where
        F: FnMut(&Sample) -> ControlFlow<()>,
    {
        let _span = tracing::debug_span!("simulate_realtime", duration, dt).entered();
        self.config.validate()?;
        let steps = grid_len(duration, dt)?;
        check_initial_state(options.initial_state)?;

        let mut rng = seeded_rng(options.seed);
        let params = RlcParameters::resolve(&self.circuit, &mut rng)?;
        let dynamics = NoiseDynamics::new(params, self.circuit.temperature(), self.config.source_frequency);

        // The callback may stop the run early.
        let mut samples = Vec::with_capacity(steps.min(REALTIME_RESERVE));
        let mut state = options.initial_state;
        for k in 0..steps {
            let t = k as f64 * dt;
            state = euler_step(state, dynamics.derivative(t, state, &mut rng), dt);
            let time = (k + 1) as f64 * dt;
            if !state.is_finite() {
                return Err(ThermoError::numerical("Euler step", time));
            }

            let sample = Sample {
                time,
                current: state.current,
                voltage: state.voltage,
                energy: Some(params.energy(state)),
            };
            samples.push(sample);
            if on_step(&sample).is_break() {
                debug!(steps = k + 1, "real-time run stopped by callback");
                break;
            }
        }

        Ok(self.finish_run(samples, params, StepStats::default(), options.capture_energy))
    }

    /// Run the annealing engine as computation performed by this circuit.
    pub fn perform_computation(
        &self,
        problem: &Problem,
        config: &AnnealingConfig,
        cancel: &CancelToken,
    ) -> Result<ComputationResult> {
        debug!(mode = problem.mode(), temperature = self.circuit.temperature(), "thermodynamic computation");
        AnnealingEngine::new(config.clone()).run(problem, cancel)
    }

    /// Energy over a grid of states, using the parameters of the last run.
    pub fn energy_landscape(&self, currents: &[f64], voltages: &[f64]) -> Option<EnergyLandscape> {
        self.last_parameters
            .as_ref()
            .map(|params| EnergyLandscape::compute(currents, voltages, params))
    }

    fn finish_run(
        &mut self,
        samples: Vec<Sample>,
        params: RlcParameters,
        stats: StepStats,
        keep_history: bool,
    ) -> Trajectory {
        if keep_history {
            let stride = (samples.len() / self.config.history_points.max(1)).max(1);
            self.history.push(HistoryEntry {
                parameters: params,
                samples: samples.iter().step_by(stride).copied().collect(),
            });
        }
        self.last_parameters = Some(params);
        Trajectory::new(samples, params, stats)
    }
}

/// Number of `dt`-spaced points `k * dt` with `k * dt < duration`.
fn grid_len(duration: f64, dt: f64) -> Result<usize> {
    if !(duration.is_finite() && duration > 0.0) {
        return Err(ThermoError::invalid_parameter(
            "duration",
            format!("must be positive, got {}", duration),
        ));
    }
    if !(dt.is_finite() && dt > 0.0) {
        return Err(ThermoError::invalid_parameter(
            "dt",
            format!("must be positive, got {}", dt),
        ));
    }
    // Absorb rounding in the quotient so 0.01 / 1e-4 gives 100 points.
    let n = (duration / dt * (1.0 - 1e-12)).ceil().max(1.0);
    let limit = isize::MAX as f64 / std::mem::size_of::<Sample>() as f64;
    if !(n < limit) {
        return Err(ThermoError::invalid_parameter(
            "dt",
            format!("{} s over {} s gives more samples than fit in memory", dt, duration),
        ));
    }
    Ok(n as usize)
}

fn check_initial_state(state: State) -> Result<()> {
    if state.is_finite() {
        Ok(())
    } else {
        Err(ThermoError::invalid_parameter("initial_state", "must be finite"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{presets, Component, ComponentKind};
    use approx::assert_relative_eq;

    fn lossless_loop() -> Circuit {
        let mut circuit = Circuit::new(1e-9).unwrap();
        for (name, kind, value) in [
            ("R1", ComponentKind::Resistor, 0.0),
            ("L1", ComponentKind::Inductor, 0.1),
            ("C1", ComponentKind::Capacitor, 1e-6),
            ("V1", ComponentKind::Source, 0.0),
        ] {
            circuit
                .add_component(Component::ideal(name, kind, value).unwrap())
                .unwrap();
        }
        circuit
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let mut sim = Simulator::new(presets::example_circuit());
        let options = RunOptions::new().with_seed(42);
        let a = sim.simulate(0.005, 1e-4, &options).unwrap();
        let b = sim.simulate(0.005, 1e-4, &options).unwrap();
        assert_eq!(a.samples(), b.samples());

        let c = sim.simulate(0.005, 1e-4, &RunOptions::new().with_seed(43)).unwrap();
        assert_ne!(a.parameters(), c.parameters());
    }

    #[test]
    fn test_grid_and_shape() {
        let mut sim = Simulator::new(presets::example_circuit());
        let traj = sim.simulate(0.01, 1e-4, &RunOptions::new().with_seed(1)).unwrap();
        assert_eq!(traj.len(), 100);
        assert_eq!(traj.samples()[0].time, 0.0);
        assert!(traj.times().windows(2).all(|w| w[1] > w[0]));
        assert!(traj.energies().is_none());
    }

    fn circuit_without(missing: ComponentKind) -> Circuit {
        let mut circuit = Circuit::new(300.0).unwrap();
        for (name, kind, value) in [
            ("R1", ComponentKind::Resistor, 1000.0),
            ("L1", ComponentKind::Inductor, 0.1),
            ("C1", ComponentKind::Capacitor, 1e-6),
            ("V1", ComponentKind::Source, 5.0),
        ] {
            if kind != missing {
                circuit
                    .add_component(Component::ideal(name, kind, value).unwrap())
                    .unwrap();
            }
        }
        circuit
    }

    #[test]
    fn test_each_missing_role_is_fatal() {
        for kind in ComponentKind::ALL {
            let mut sim = Simulator::new(circuit_without(kind));
            match sim.simulate(0.01, 1e-3, &RunOptions::new()) {
                Err(ThermoError::MissingComponent { kind: reported }) => assert_eq!(reported, kind),
                other => panic!("simulate without {kind}: {other:?}"),
            }
            match sim.simulate_realtime(0.01, 1e-3, &RunOptions::new(), |_| ControlFlow::Continue(())) {
                Err(ThermoError::MissingComponent { kind: reported }) => assert_eq!(reported, kind),
                other => panic!("simulate_realtime without {kind}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_max_step_bounds_batch_steps() {
        let config = SimulatorConfig::new().with_max_step(1e-5);
        let mut sim = Simulator::with_config(presets::example_circuit(), config);
        let traj = sim.simulate(0.01, 1e-4, &RunOptions::new().with_seed(1)).unwrap();
        assert_eq!(traj.len(), 100);
        assert!(traj.step_stats().accepted >= 990, "{:?}", traj.step_stats());
    }

    #[test]
    fn test_oversized_grid_is_rejected() {
        let mut sim = Simulator::new(presets::example_circuit());
        let err = sim
            .simulate_realtime(1.0, 1e-300, &RunOptions::new(), |_| ControlFlow::Break(()))
            .unwrap_err();
        assert!(matches!(err, ThermoError::InvalidParameter { .. }));
        let err = sim.simulate(1.0, 1e-300, &RunOptions::new()).unwrap_err();
        assert!(matches!(err, ThermoError::InvalidParameter { .. }));
    }

    #[test]
    fn test_realtime_checks_config() {
        let config = SimulatorConfig::new().with_source_frequency(f64::NAN);
        let mut sim = Simulator::with_config(presets::example_circuit(), config);
        let err = sim
            .simulate_realtime(0.01, 1e-3, &RunOptions::new(), |_| ControlFlow::Continue(()))
            .unwrap_err();
        assert!(matches!(err, ThermoError::InvalidParameter { .. }));
    }

    #[test]
    fn test_lossless_loop_conserves_energy() {
        let config = SimulatorConfig::new().with_tolerances(1e-6, 1e-9);
        let mut sim = Simulator::with_config(lossless_loop(), config);
        let options = RunOptions::new()
            .with_initial_state(0.01, 0.0)
            .with_seed(5)
            .with_energy(true);
        let traj = sim.simulate(0.01, 1e-4, &options).unwrap();
        let energies = traj.energies().unwrap();
        let e0 = energies[0];
        assert_relative_eq!(e0, 0.5 * 0.1 * 1e-4, max_relative = 1e-12);
        for e in energies {
            assert_relative_eq!(e, e0, max_relative = 1e-3);
        }
    }

    #[test]
    fn test_example_step_response_settles() {
        let mut sim = Simulator::new(presets::example_circuit());
        let traj = sim.simulate(0.05, 1e-4, &RunOptions::new().with_seed(7)).unwrap();
        let v_source = traj.parameters().source_voltage;
        let last = traj.final_state().unwrap();
        assert!(last.current.abs() < 1e-5, "residual current {}", last.current);
        assert_relative_eq!(last.voltage, v_source, max_relative = 1e-3);

        // Charging current flows in the source direction.
        let peak = traj.currents().into_iter().fold(f64::MIN, f64::max);
        assert!(peak > 1e-3 && peak < v_source / 1000.0);
    }

    #[test]
    fn test_realtime_stops_on_break() {
        let mut sim = Simulator::new(presets::example_circuit());
        let mut calls = 0;
        let traj = sim
            .simulate_realtime(0.01, 1e-4, &RunOptions::new().with_seed(3), |sample| {
                calls += 1;
                assert!(sample.energy.is_some());
                if calls == 10 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert_eq!(calls, 10);
        assert_eq!(traj.len(), 10);
        assert_relative_eq!(traj.samples()[9].time, 10.0 * 1e-4);
    }

    #[test]
    fn test_realtime_full_run_ends_at_duration() {
        let mut sim = Simulator::new(presets::example_circuit());
        let traj = sim
            .simulate_realtime(0.01, 1e-4, &RunOptions::new().with_seed(3), |_| {
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(traj.len(), 100);
        assert_relative_eq!(traj.samples()[99].time, 0.01, max_relative = 1e-12);
        assert!(sim.history().is_empty());
        assert!(sim.last_parameters().is_some());
    }

    #[test]
    fn test_energy_capture_records_history() {
        let mut sim = Simulator::new(presets::example_circuit());
        let traj = sim
            .simulate(0.1, 1e-4, &RunOptions::new().with_seed(9).with_energy(true))
            .unwrap();
        assert_eq!(traj.energies().map(|e| e.len()), Some(traj.len()));
        assert_eq!(sim.history().len(), 1);
        let kept = sim.history()[0].samples.len();
        assert!((90..=110).contains(&kept), "kept {kept} points");

        let landscape = sim.energy_landscape(&[0.0, 0.001], &[0.0, 5.0]).unwrap();
        assert_eq!(landscape.energies.len(), 2);
    }

    #[test]
    fn test_invalid_grid_rejected() {
        let mut sim = Simulator::new(presets::example_circuit());
        for (duration, dt) in [(0.0, 1e-3), (0.01, 0.0), (f64::NAN, 1e-3), (0.01, -1.0)] {
            assert!(matches!(
                sim.simulate(duration, dt, &RunOptions::new()),
                Err(ThermoError::InvalidParameter { .. })
            ));
        }
    }
}
