//! Ready-made circuits.

use super::{Circuit, Component, ComponentKind};
use crate::error::Result;

/// Series RLC loop at room temperature: 1 kΩ, 100 mH, 1 µF, 5 V.
pub fn example_circuit() -> Circuit {
    // Every value below is finite and every name unique.
    build_example().unwrap_or_default()
}

/// Larger circuit at 350 K with three resistors, two inductors, two
/// capacitors and one source. Only R1, L1, C1 and V1 drive the loop; the
/// rest take part through couplings.
pub fn demo_circuit() -> Circuit {
    build_demo().unwrap_or_default()
}

fn build_example() -> Result<Circuit> {
    let mut circuit = Circuit::new(300.0)?;
    circuit.add_component(Component::new("R1", ComponentKind::Resistor, 1000.0, 0.01, 0.001)?)?;
    circuit.add_component(Component::new("L1", ComponentKind::Inductor, 0.1, 0.005, 0.0005)?)?;
    circuit.add_component(Component::new("C1", ComponentKind::Capacitor, 1e-6, 0.02, 0.002)?)?;
    circuit.add_component(Component::new("V1", ComponentKind::Source, 5.0, 0.001, 0.0001)?)?;

    circuit.set_coupling("R1", "L1", 0.1)?;
    circuit.set_coupling("L1", "C1", 0.2)?;
    circuit.set_coupling("C1", "V1", 0.05)?;
    Ok(circuit)
}

fn build_demo() -> Result<Circuit> {
    let mut circuit = Circuit::new(350.0)?;

    for i in 0..3 {
        circuit.add_component(Component::new(
            format!("R{}", i + 1),
            ComponentKind::Resistor,
            1000.0 * (i + 1) as f64,
            0.02 + i as f64 * 0.01,
            0.001,
        )?)?;
    }
    for i in 0..2 {
        circuit.add_component(Component::new(
            format!("L{}", i + 1),
            ComponentKind::Inductor,
            0.1 * (i + 1) as f64,
            0.008,
            0.0005,
        )?)?;
    }
    for i in 0..2 {
        circuit.add_component(Component::new(
            format!("C{}", i + 1),
            ComponentKind::Capacitor,
            1e-6 * (i + 1) as f64,
            0.025,
            0.002,
        )?)?;
    }
    circuit.add_component(Component::new("V1", ComponentKind::Source, 5.0, 0.001, 0.0001)?)?;

    for (a, b, strength) in [
        ("R1", "L1", 0.2),
        ("L1", "C1", 0.3),
        ("C1", "V1", 0.1),
        ("R2", "L2", 0.25),
        ("L2", "C2", 0.35),
        ("C2", "V1", 0.15),
        ("R3", "L1", 0.18),
        ("R3", "L2", 0.22),
    ] {
        circuit.set_coupling(a, b, strength)?;
    }
    Ok(circuit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::validate_circuit;

    #[test]
    fn test_presets_are_valid() {
        let example = example_circuit();
        assert_eq!(example.len(), 4);
        validate_circuit(&example).unwrap();

        let demo = demo_circuit();
        assert_eq!(demo.len(), 8);
        assert_eq!(demo.temperature(), 350.0);
        assert_eq!(demo.coupling().size(), 8);
        validate_circuit(&demo).unwrap();
    }
}
