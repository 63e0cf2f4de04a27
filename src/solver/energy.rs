//! Energy function of the RLC loop.
//!
//! ```text
//! E(i, v) = L i^2 / 2 + C v^2 / 2 + R i^2 * tau - i V * tau
//! ```
//!
//! The first two terms are the stored magnetic and electric energy. The
//! last two are the dissipated and delivered energy over the reference
//! period `tau` ([`crate::ENERGY_PERIOD`]).

use serde::Serialize;

use super::dynamics::{RlcParameters, State};
use crate::ENERGY_PERIOD;

/// Evaluate the energy function at a state.
pub fn energy(state: State, params: &RlcParameters) -> f64 {
    let State { current, voltage } = state;
    0.5 * params.inductance * current * current
        + 0.5 * params.capacitance * voltage * voltage
        + params.resistance * current * current * ENERGY_PERIOD
        - current * params.source_voltage * ENERGY_PERIOD
}

impl RlcParameters {
    /// Energy function at `state` for these parameters.
    pub fn energy(&self, state: State) -> f64 {
        energy(state, self)
    }
}

/// Energy sampled over a rectangular grid of `(i, v)` states.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyLandscape {
    pub currents: Vec<f64>,
    pub voltages: Vec<f64>,
    /// `energies[a][b]` is the energy at `(currents[a], voltages[b])`
    pub energies: Vec<Vec<f64>>,
}

impl EnergyLandscape {
    /// Evaluate the energy at every grid point.
    pub fn compute(currents: &[f64], voltages: &[f64], params: &RlcParameters) -> Self {
        let energies = currents
            .iter()
            .map(|&i| voltages.iter().map(|&v| energy(State::new(i, v), params)).collect())
            .collect();
        Self {
            currents: currents.to_vec(),
            voltages: voltages.to_vec(),
            energies,
        }
    }

    /// Grid point with the lowest energy, as `(state, energy)`.
    pub fn minimum(&self) -> Option<(State, f64)> {
        let mut best: Option<(State, f64)> = None;
        for (a, row) in self.energies.iter().enumerate() {
            for (b, &e) in row.iter().enumerate() {
                if best.map_or(true, |(_, min)| e < min) {
                    best = Some((State::new(self.currents[a], self.voltages[b]), e));
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> RlcParameters {
        RlcParameters {
            resistance: 1000.0,
            inductance: 0.1,
            capacitance: 1e-6,
            source_voltage: 5.0,
        }
    }

    #[test]
    fn test_energy_terms() {
        let p = params();
        assert_eq!(energy(State::ZERO, &p), 0.0);
        // stored energy only
        assert_relative_eq!(energy(State::new(0.0, 5.0), &p), 0.5 * 1e-6 * 25.0);
        // 0.5*0.1*1e-4 + 1000*1e-4*1e-3 - 0.01*5*1e-3
        assert_relative_eq!(
            energy(State::new(0.01, 0.0), &p),
            5e-6 + 1e-4 - 5e-5,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_landscape_minimum() {
        let p = params();
        let currents: Vec<f64> = (-10..=10).map(|k| k as f64 * 1e-3).collect();
        let voltages: Vec<f64> = (-5..=5).map(|k| k as f64).collect();
        let landscape = EnergyLandscape::compute(&currents, &voltages, &p);
        assert_eq!(landscape.energies.len(), currents.len());
        assert_eq!(landscape.energies[0].len(), voltages.len());

        // Quadratic in i with minimum at V*tau / (L + 2 R tau) = 2.38e-3
        let (state, _) = landscape.minimum().unwrap();
        assert_relative_eq!(state.current, 2e-3, epsilon = 1e-12);
        assert_eq!(state.voltage, 0.0);
    }
}
