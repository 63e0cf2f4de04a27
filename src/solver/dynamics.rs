//! Stochastic right-hand side of the series RLC loop.
//!
//! State is `(i, v)`: loop current and capacitor voltage.
//!
//! ```text
//! di/dt = (V_s(t) - v - R i) / L + xi_i      xi_i ~ N(0, sqrt(2 kB T R) / L)
//! dv/dt = i / C                  + xi_v      xi_v ~ N(0, sqrt(2 kB T / C))
//! ```
//!
//! `V_s(t)` is `V` for a DC source (omega = 0) and `V sin(omega t)` otherwise.

use std::ops::{Add, Mul};

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::circuit::{Circuit, ComponentKind};
use crate::error::{Result, ThermoError};
use crate::BOLTZMANN_CONSTANT;

/// Loop state: current through the loop and voltage across the capacitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub current: f64,
    pub voltage: f64,
}

impl State {
    pub const ZERO: State = State {
        current: 0.0,
        voltage: 0.0,
    };

    pub fn new(current: f64, voltage: f64) -> Self {
        Self { current, voltage }
    }

    pub fn is_finite(&self) -> bool {
        self.current.is_finite() && self.voltage.is_finite()
    }
}

impl Add for State {
    type Output = State;

    fn add(self, rhs: State) -> State {
        State::new(self.current + rhs.current, self.voltage + rhs.voltage)
    }
}

impl Mul<f64> for State {
    type Output = State;

    fn mul(self, h: f64) -> State {
        State::new(self.current * h, self.voltage * h)
    }
}

/// Element values frozen for one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RlcParameters {
    /// Resistance in ohms
    pub resistance: f64,
    /// Inductance in henries
    pub inductance: f64,
    /// Capacitance in farads
    pub capacitance: f64,
    /// Source amplitude in volts
    pub source_voltage: f64,
}

impl RlcParameters {
    /// Draw R, L, C and V (in that order) from the circuit's designated
    /// components at the circuit temperature.
    pub fn resolve<R: Rng + ?Sized>(circuit: &Circuit, rng: &mut R) -> Result<Self> {
        let temperature = circuit.temperature();
        let mut draw = |kind| -> Result<f64> {
            Ok(circuit.role_component(kind)?.instantaneous_value(temperature, rng))
        };

        let params = Self {
            resistance: draw(ComponentKind::Resistor)?,
            inductance: draw(ComponentKind::Inductor)?,
            capacitance: draw(ComponentKind::Capacitor)?,
            source_voltage: draw(ComponentKind::Source)?,
        };

        if !(params.inductance > 0.0 && params.capacitance > 0.0) {
            return Err(ThermoError::numerical(
                format!(
                    "component noise produced non-positive L={:e} or C={:e}",
                    params.inductance, params.capacitance
                ),
                0.0,
            ));
        }
        if !(params.resistance.is_finite() && params.source_voltage.is_finite()) {
            return Err(ThermoError::numerical("non-finite component value", 0.0));
        }
        Ok(params)
    }

    /// Undamped natural angular frequency `1 / sqrt(LC)`.
    pub fn natural_frequency(&self) -> f64 {
        1.0 / (self.inductance * self.capacitance).sqrt()
    }

    /// Damping ratio `R / 2 * sqrt(C / L)`; below 1 the loop rings.
    pub fn damping_ratio(&self) -> f64 {
        0.5 * self.resistance * (self.capacitance / self.inductance).sqrt()
    }
}

/// Drift and thermal-noise terms of the loop SDE.
#[derive(Debug, Clone)]
pub struct NoiseDynamics {
    params: RlcParameters,
    omega: f64,
    current_noise_std: f64,
    voltage_noise_std: f64,
}

impl NoiseDynamics {
    /// Build the dynamics for frozen parameters at `temperature` kelvin,
    /// driven at angular frequency `omega` (0 for DC).
    pub fn new(params: RlcParameters, temperature: f64, omega: f64) -> Self {
        let kt2 = 2.0 * BOLTZMANN_CONSTANT * temperature;
        Self {
            params,
            omega,
            current_noise_std: (kt2 * params.resistance.max(0.0)).sqrt() / params.inductance,
            voltage_noise_std: (kt2 / params.capacitance).sqrt(),
        }
    }

    pub fn params(&self) -> &RlcParameters {
        &self.params
    }

    /// Standard deviations of the current and voltage noise terms.
    pub fn noise_std(&self) -> State {
        State::new(self.current_noise_std, self.voltage_noise_std)
    }

    /// Source voltage at time `t`.
    pub fn source_voltage(&self, t: f64) -> f64 {
        if self.omega == 0.0 {
            self.params.source_voltage
        } else {
            self.params.source_voltage * (self.omega * t).sin()
        }
    }

    /// Deterministic part of the derivative.
    pub fn drift(&self, t: f64, state: State) -> State {
        let p = &self.params;
        State::new(
            (self.source_voltage(t) - state.voltage - p.resistance * state.current) / p.inductance,
            state.current / p.capacitance,
        )
    }

    /// Draw the two independent noise terms (current first, then voltage).
    pub fn sample_noise<R: Rng + ?Sized>(&self, rng: &mut R) -> State {
        let zi: f64 = rng.sample(StandardNormal);
        let zv: f64 = rng.sample(StandardNormal);
        State::new(self.current_noise_std * zi, self.voltage_noise_std * zv)
    }

    /// Full stochastic derivative: drift plus a fresh noise draw.
    pub fn derivative<R: Rng + ?Sized>(&self, t: f64, state: State, rng: &mut R) -> State {
        self.drift(t, state) + self.sample_noise(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn params() -> RlcParameters {
        RlcParameters {
            resistance: 1000.0,
            inductance: 0.1,
            capacitance: 1e-6,
            source_voltage: 5.0,
        }
    }

    #[test]
    fn test_drift_at_rest_charges_capacitor() {
        let dynamics = NoiseDynamics::new(params(), 300.0, 0.0);
        let d = dynamics.drift(0.0, State::ZERO);
        assert_relative_eq!(d.current, 50.0);
        assert_eq!(d.voltage, 0.0);
        // DC steady state: no current, capacitor at source voltage
        let d = dynamics.drift(1.0, State::new(0.0, 5.0));
        assert_eq!(d, State::ZERO);
    }

    #[test]
    fn test_ac_source() {
        let dynamics = NoiseDynamics::new(params(), 300.0, 100.0);
        assert_eq!(dynamics.source_voltage(0.0), 0.0);
        assert_relative_eq!(
            dynamics.source_voltage(std::f64::consts::PI / 200.0),
            5.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_noise_std_follows_fluctuation_dissipation() {
        let dynamics = NoiseDynamics::new(params(), 300.0, 0.0);
        let std = dynamics.noise_std();
        assert_relative_eq!(std.current, (2.0 * 1.38e-23 * 300.0 * 1000.0_f64).sqrt() / 0.1);
        assert_relative_eq!(std.voltage, (2.0 * 1.38e-23 * 300.0 / 1e-6_f64).sqrt());
    }

    #[test]
    fn test_noise_draws_are_independent() {
        let mut p = params();
        p.inductance = 1.0;
        p.capacitance = 1.0;
        let dynamics = NoiseDynamics::new(p, 1e22, 0.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let n = 20_000;
        let mut sum_iv = 0.0;
        let mut sum_ii = 0.0;
        for _ in 0..n {
            let s = dynamics.sample_noise(&mut rng);
            sum_iv += s.current * s.voltage;
            sum_ii += s.current * s.current;
        }
        let corr = sum_iv / sum_ii;
        assert!(corr.abs() < 0.05, "correlation {corr}");
    }

    #[test]
    fn test_damping_ratio() {
        let p = params();
        // 0.5 * 1000 * sqrt(1e-6 / 0.1)
        assert_relative_eq!(p.damping_ratio(), 1.5811388300841898, max_relative = 1e-12);
        assert_relative_eq!(p.natural_frequency(), 3162.2776601683795, max_relative = 1e-12);
    }
}
