//! Stochastic circuit elements.

use rand::Rng;
use rand_distr::StandardNormal;

use super::types::ComponentKind;
use crate::error::{Result, ThermoError};
use crate::REFERENCE_TEMPERATURE;

/// A circuit element whose value drifts with temperature and carries
/// multiplicative Gaussian noise.
///
/// Nominal value and noise amplitude only change through calibration or
/// characterization routines; a simulation run reads them and never
/// writes them.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Unique component name
    pub name: String,
    /// Element kind
    pub kind: ComponentKind,
    /// Nominal value in the SI unit of the kind (ohm, H, F, V)
    pub nominal_value: f64,
    /// Fractional standard deviation of the multiplicative noise
    pub noise_amplitude: f64,
    /// Fractional change per kelvin relative to 300 K
    pub temperature_coefficient: f64,
}

impl Component {
    /// Create a new component.
    ///
    /// Fails if the noise amplitude is negative or any value is not finite.
    pub fn new(
        name: impl Into<String>,
        kind: ComponentKind,
        nominal_value: f64,
        noise_amplitude: f64,
        temperature_coefficient: f64,
    ) -> Result<Self> {
        let name = name.into();
        if !nominal_value.is_finite() {
            return Err(ThermoError::invalid_parameter(
                &name,
                format!("nominal value must be finite, got {}", nominal_value),
            ));
        }
        if !(noise_amplitude.is_finite() && noise_amplitude >= 0.0) {
            return Err(ThermoError::invalid_parameter(
                &name,
                format!("noise amplitude must be >= 0, got {}", noise_amplitude),
            ));
        }
        if !temperature_coefficient.is_finite() {
            return Err(ThermoError::invalid_parameter(
                &name,
                "temperature coefficient must be finite",
            ));
        }
        Ok(Self {
            name,
            kind,
            nominal_value,
            noise_amplitude,
            temperature_coefficient,
        })
    }

    /// Create a noise-free component with no temperature dependence.
    pub fn ideal(name: impl Into<String>, kind: ComponentKind, nominal_value: f64) -> Result<Self> {
        Self::new(name, kind, nominal_value, 0.0, 0.0)
    }

    /// Temperature scaling factor relative to the 300 K reference.
    pub fn temperature_factor(&self, temperature: f64) -> f64 {
        1.0 + self.temperature_coefficient * (temperature - REFERENCE_TEMPERATURE) / REFERENCE_TEMPERATURE
    }

    /// Draw the value this component takes at `temperature`.
    ///
    /// `nominal * (1 + tc * (T - 300) / 300) * (1 + noise)` with
    /// `noise ~ Normal(0, noise_amplitude)`. Consumes one standard-normal
    /// draw from `rng` even when the amplitude is zero, so the draw order
    /// of a run does not depend on which components are noisy.
    pub fn instantaneous_value<R: Rng + ?Sized>(&self, temperature: f64, rng: &mut R) -> f64 {
        let z: f64 = rng.sample(StandardNormal);
        let noise = self.noise_amplitude * z;
        self.nominal_value * self.temperature_factor(temperature) * (1.0 + noise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_noise_free_value_at_reference_is_nominal() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for (kind, value) in [
            (ComponentKind::Resistor, 1000.0),
            (ComponentKind::Inductor, 0.1),
            (ComponentKind::Capacitor, 1e-6),
            (ComponentKind::Source, 5.0),
        ] {
            let c = Component::new("X", kind, value, 0.0, 0.003).unwrap();
            for _ in 0..10 {
                assert_eq!(c.instantaneous_value(300.0, &mut rng), value);
            }
        }
    }

    #[test]
    fn test_temperature_scaling() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let r = Component::new("R1", ComponentKind::Resistor, 1000.0, 0.0, 0.003).unwrap();
        // 1 + 0.003 * 300 / 300
        assert_relative_eq!(r.instantaneous_value(600.0, &mut rng), 1003.0, max_relative = 1e-12);
    }

    #[test]
    fn test_noisy_value_is_seed_deterministic() {
        let c = Component::new("C1", ComponentKind::Capacitor, 1e-6, 0.05, 0.0).unwrap();
        let a = c.instantaneous_value(300.0, &mut ChaCha8Rng::seed_from_u64(42));
        let b = c.instantaneous_value(300.0, &mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(a, b);
        assert_ne!(a, 1e-6);
    }

    #[test]
    fn test_negative_noise_rejected() {
        assert!(Component::new("R1", ComponentKind::Resistor, 1.0, -0.1, 0.0).is_err());
    }
}
