//! Calibration and single-parameter characterization.
//!
//! These are the only routines that write component nominal values.

use serde::Serialize;
use tracing::{debug, info};

use crate::circuit::ComponentKind;
use crate::error::{Result, ThermoError};
use crate::solver::{RunOptions, Simulator, SummaryStats};

/// Targets and loop settings for [`calibrate`].
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationConfig {
    /// Steady-state current target in amperes.
    pub target_current: f64,
    /// Steady-state voltage target in volts.
    pub target_voltage: f64,
    /// Largest acceptable error (relative, or absolute for a zero target).
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Length of each trial run.
    pub duration: f64,
    pub dt: f64,
    /// Seed of every trial run; `None` draws fresh noise each time.
    pub seed: Option<u64>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            target_current: 1.0,
            target_voltage: 5.0,
            tolerance: 0.1,
            max_iterations: 100,
            duration: 0.1,
            dt: 1e-3,
            seed: None,
        }
    }
}

impl CalibrationConfig {
    pub fn new(target_current: f64, target_voltage: f64) -> Self {
        Self {
            target_current,
            target_voltage,
            ..Self::default()
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// One nominal value change made by the calibration loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Adjustment {
    pub iteration: usize,
    pub component: String,
    pub old_value: f64,
    pub new_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationReport {
    pub success: bool,
    /// Trial runs performed
    pub iterations: usize,
    pub adjustments: Vec<Adjustment>,
    /// Steady-state current of the last trial run
    pub final_current: f64,
    /// Steady-state voltage of the last trial run
    pub final_voltage: f64,
}

/// Proportional control of the resistor and source nominal values toward
/// a steady-state current and voltage.
///
/// Steady state is the mean of the last 20% of each trial run. After a
/// miss, `R *= 1 + e_i / 2` and `V *= 1 - e_v / 2`, where `e` is the
/// signed error of current and voltage.
///
/// The voltage rule is negated on purpose: a naive `V *= 1 + e_v / 2`
/// drives V away from its target, while this form raises V when the
/// steady-state voltage is low and lowers it when high.
pub fn calibrate(simulator: &mut Simulator, config: &CalibrationConfig) -> Result<CalibrationReport> {
    let _span = tracing::info_span!(
        "calibrate",
        target_current = config.target_current,
        target_voltage = config.target_voltage
    ).entered();
    if !(config.tolerance > 0.0) {
        return Err(ThermoError::invalid_parameter("tolerance", "must be positive"));
    }

    let options = RunOptions {
        seed: config.seed,
        ..RunOptions::default()
    };
    let mut report = CalibrationReport {
        success: false,
        iterations: 0,
        adjustments: Vec::new(),
        final_current: 0.0,
        final_voltage: 0.0,
    };

    for iteration in 0..config.max_iterations {
        let steady = simulator
            .simulate(config.duration, config.dt, &options)?
            .tail_summary(0.2);
        report.iterations = iteration + 1;
        report.final_current = steady.current_mean;
        report.final_voltage = steady.voltage_mean;

        let current_error = signed_error(steady.current_mean, config.target_current);
        let voltage_error = signed_error(steady.voltage_mean, config.target_voltage);
        debug!(iteration, current_error, voltage_error, "calibration step");
        if current_error.abs() < config.tolerance && voltage_error.abs() < config.tolerance {
            report.success = true;
            break;
        }

        for (kind, factor) in [
            (ComponentKind::Resistor, 1.0 + 0.5 * current_error),
            (ComponentKind::Source, 1.0 - 0.5 * voltage_error),
        ] {
            let component = simulator.circuit().role_component(kind)?;
            let name = component.name.clone();
            let old_value = component.nominal_value;
            let new_value = old_value * factor;
            simulator.circuit_mut().set_nominal_value(&name, new_value)?;
            report.adjustments.push(Adjustment {
                iteration,
                component: name,
                old_value,
                new_value,
            });
        }
    }

    info!(
        success = report.success,
        iterations = report.iterations,
        "calibration finished"
    );
    Ok(report)
}

fn signed_error(actual: f64, target: f64) -> f64 {
    if target == 0.0 {
        actual
    } else {
        (actual - target) / target
    }
}

/// Statistics of one characterization run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterizationRecord {
    pub parameter: String,
    pub value: f64,
    pub repetition: usize,
    pub stats: SummaryStats,
}

/// Sweep one component's nominal value, `repeats` runs per value.
///
/// Runs use `dt = 1e-3` and seed = repetition index. The original nominal
/// value is restored afterwards, also when a run fails.
pub fn characterize(
    simulator: &mut Simulator,
    name: &str,
    values: &[f64],
    repeats: usize,
    duration: f64,
) -> Result<Vec<CharacterizationRecord>> {
    let _span = tracing::info_span!("characterize", component = name, values = values.len(), repeats).entered();
    let original = simulator
        .circuit()
        .component(name)
        .map(|c| c.nominal_value)
        .ok_or_else(|| ThermoError::ComponentNotFound {
            name: name.to_string(),
        })?;

    let result = characterize_inner(simulator, name, values, repeats, duration);
    simulator.circuit_mut().set_nominal_value(name, original)?;
    result
}

fn characterize_inner(
    simulator: &mut Simulator,
    name: &str,
    values: &[f64],
    repeats: usize,
    duration: f64,
) -> Result<Vec<CharacterizationRecord>> {
    let mut records = Vec::with_capacity(values.len() * repeats);
    for &value in values {
        simulator.circuit_mut().set_nominal_value(name, value)?;
        for repetition in 0..repeats {
            let options = RunOptions::new().with_seed(repetition as u64);
            let trajectory = simulator.simulate(duration, 1e-3, &options)?;
            records.push(CharacterizationRecord {
                parameter: name.to_string(),
                value,
                repetition,
                stats: trajectory.summary(),
            });
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{presets, Circuit, Component};
    use approx::assert_relative_eq;

    fn ideal_loop() -> Circuit {
        let mut circuit = Circuit::new(300.0).unwrap();
        for (name, kind, value) in [
            ("R1", ComponentKind::Resistor, 1000.0),
            ("L1", ComponentKind::Inductor, 0.1),
            ("C1", ComponentKind::Capacitor, 1e-6),
            ("V1", ComponentKind::Source, 5.0),
        ] {
            circuit
                .add_component(Component::ideal(name, kind, value).unwrap())
                .unwrap();
        }
        circuit
    }

    #[test]
    fn test_calibrate_lowers_source_toward_target_voltage() {
        let mut sim = Simulator::new(ideal_loop());
        let config = CalibrationConfig::new(0.0, 4.0)
            .with_tolerance(0.01)
            .with_seed(0);
        let report = calibrate(&mut sim, &config).unwrap();

        assert!(report.success);
        assert!(report.iterations > 1);
        assert_relative_eq!(report.final_voltage, 4.0, max_relative = 0.01);
        let v1 = sim.circuit().component("V1").unwrap().nominal_value;
        assert!(v1 < 5.0);
        let first = &report.adjustments[1];
        assert_eq!(first.component, "V1");
        assert_eq!(first.old_value, 5.0);
        assert_relative_eq!(first.new_value, 4.375, max_relative = 1e-3);
    }

    #[test]
    fn test_calibrate_raises_source_when_voltage_is_low() {
        let mut sim = Simulator::new(ideal_loop());
        let config = CalibrationConfig::new(0.0, 6.0)
            .with_tolerance(0.01)
            .with_seed(0);
        let report = calibrate(&mut sim, &config).unwrap();

        assert!(report.success);
        let first = &report.adjustments[1];
        assert_eq!(first.component, "V1");
        assert_relative_eq!(first.new_value, 5.0 * (1.0 + 1.0 / 12.0), max_relative = 1e-3);
        assert!(sim.circuit().component("V1").unwrap().nominal_value > 5.0);
        assert_relative_eq!(report.final_voltage, 6.0, max_relative = 0.01);
    }

    #[test]
    fn test_calibrate_gives_up_after_max_iterations() {
        let mut sim = Simulator::new(ideal_loop());
        // DC loops settle at zero current.
        let config = CalibrationConfig::new(1.0, 5.0).with_max_iterations(3).with_seed(0);
        let report = calibrate(&mut sim, &config).unwrap();
        assert!(!report.success);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.adjustments.len(), 6);
    }

    #[test]
    fn test_characterize_restores_value() {
        let mut sim = Simulator::new(presets::example_circuit());
        let records = characterize(&mut sim, "V1", &[1.0, 2.0], 2, 0.01).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[3].value, 2.0);
        assert_eq!(records[3].repetition, 1);
        assert!(records[2].stats.voltage_mean > records[0].stats.voltage_mean);
        assert_eq!(sim.circuit().component("V1").unwrap().nominal_value, 5.0);
    }

    #[test]
    fn test_characterize_unknown_component() {
        let mut sim = Simulator::new(presets::example_circuit());
        assert!(matches!(
            characterize(&mut sim, "Q1", &[1.0], 1, 0.01),
            Err(ThermoError::ComponentNotFound { .. })
        ));
    }
}
