//! Circuit validation.

use crate::error::{Result, ThermoError};

use super::network::check_temperature;
use super::{Circuit, ComponentKind};

/// Validate a circuit for simulation.
///
/// Checks:
/// - Temperature is positive
/// - Every loop role (R, L, C, source) has a component
/// - The designated inductor and capacitor have positive nominal values
///   and the resistor is not negative
/// - The coupling matrix is symmetric and covers every component
pub fn validate_circuit(circuit: &Circuit) -> Result<()> {
    check_temperature(circuit.temperature())?;
    circuit.require_roles()?;

    for kind in [ComponentKind::Inductor, ComponentKind::Capacitor] {
        let component = circuit.role_component(kind)?;
        if component.nominal_value <= 0.0 {
            return Err(ThermoError::invalid_parameter(
                &component.name,
                format!("{} value must be positive", kind),
            ));
        }
    }

    let resistor = circuit.role_component(ComponentKind::Resistor)?;
    if resistor.nominal_value < 0.0 {
        return Err(ThermoError::invalid_parameter(
            &resistor.name,
            "resistance must not be negative",
        ));
    }

    let coupling = circuit.coupling();
    if !coupling.is_symmetric() {
        return Err(ThermoError::invalid_parameter(
            "coupling_matrix",
            "matrix is not symmetric",
        ));
    }
    // Matrices are grown lazily, so only a non-trivial matrix has to cover
    // the whole component list.
    if coupling.size() > 1 && coupling.size() < circuit.len() {
        return Err(ThermoError::invalid_parameter(
            "coupling_matrix",
            format!(
                "dimension {} is smaller than component count {}",
                coupling.size(),
                circuit.len()
            ),
        ));
    }

    Ok(())
}
