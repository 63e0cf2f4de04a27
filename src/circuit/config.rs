//! Serializable circuit configuration record.
//!
//! ```json
//! {
//!   "temperature": 300.0,
//!   "components": {
//!     "R1": { "type": "R", "nominal_value": 1000.0, "noise_amplitude": 0.01, "temperature_coefficient": 0.001 },
//!     "V1": { "type": "Source", "nominal_value": 5.0, "noise_amplitude": 0.0, "temperature_coefficient": 0.0 }
//!   },
//!   "coupling_matrix": [[0.0, 0.1], [0.1, 0.0]],
//!   "roles": { "resistor": "R1", "source": "V1" }
//! }
//! ```
//!
//! Component entries keep document order on both read and write, since
//! that order indexes the coupling matrix.

use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Circuit, Component, ComponentKind, CouplingMatrix, Roles};
use crate::dsl;
use crate::error::{Result, ThermoError};

/// Per-component entry of a [`CircuitConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    pub nominal_value: f64,
    #[serde(default)]
    pub noise_amplitude: f64,
    #[serde(default)]
    pub temperature_coefficient: f64,
}

/// Name-keyed component entries in circuit order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentTable(pub Vec<(String, ComponentSpec)>);

impl Serialize for ComponentTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, spec) in &self.0 {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ComponentTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = ComponentTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of component name to component entry")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, spec)) = access.next_entry::<String, ComponentSpec>()? {
                    entries.push((name, spec));
                }
                Ok(ComponentTable(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// Component names designated for each loop role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleNames {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resistor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inductor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacitor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Boundary representation of a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitConfig {
    pub temperature: f64,
    pub components: ComponentTable,
    #[serde(default)]
    pub coupling_matrix: Vec<Vec<f64>>,
    #[serde(default)]
    pub roles: RoleNames,
}

impl From<&Circuit> for CircuitConfig {
    fn from(circuit: &Circuit) -> Self {
        let components = circuit
            .components()
            .iter()
            .map(|c| {
                (
                    c.name.clone(),
                    ComponentSpec {
                        kind: c.kind,
                        nominal_value: c.nominal_value,
                        noise_amplitude: c.noise_amplitude,
                        temperature_coefficient: c.temperature_coefficient,
                    },
                )
            })
            .collect();

        let roles = circuit.roles();
        let name_of = |kind| roles.get(kind).map(|id| circuit.components()[id.0].name.clone());

        Self {
            temperature: circuit.temperature(),
            components: ComponentTable(components),
            coupling_matrix: circuit.coupling().to_rows(),
            roles: RoleNames {
                resistor: name_of(ComponentKind::Resistor),
                inductor: name_of(ComponentKind::Inductor),
                capacitor: name_of(ComponentKind::Capacitor),
                source: name_of(ComponentKind::Source),
            },
        }
    }
}

impl TryFrom<CircuitConfig> for Circuit {
    type Error = ThermoError;

    fn try_from(config: CircuitConfig) -> Result<Self> {
        let mut circuit = Circuit::new(config.temperature)?;
        for (name, spec) in config.components.0 {
            circuit.add_component(Component::new(
                name,
                spec.kind,
                spec.nominal_value,
                spec.noise_amplitude,
                spec.temperature_coefficient,
            )?)?;
        }

        let RoleNames {
            resistor,
            inductor,
            capacitor,
            source,
        } = config.roles;
        for (kind, name) in [
            (ComponentKind::Resistor, resistor),
            (ComponentKind::Inductor, inductor),
            (ComponentKind::Capacitor, capacitor),
            (ComponentKind::Source, source),
        ] {
            if let Some(name) = name {
                let component = circuit.component(&name).ok_or_else(|| ThermoError::ComponentNotFound {
                    name: name.clone(),
                })?;
                if component.kind != kind {
                    return Err(ThermoError::invalid_parameter(
                        "roles",
                        format!("'{}' is a {}, not a {}", name, component.kind, kind),
                    ));
                }
                circuit.assign_role(&name)?;
            }
        }

        let coupling = if config.coupling_matrix.is_empty() {
            CouplingMatrix::default()
        } else {
            CouplingMatrix::from_rows(&config.coupling_matrix)?
        };

        let roles: Roles = circuit.roles();
        let temperature = circuit.temperature();
        let components = circuit.components().to_vec();
        Ok(Circuit::from_parts(components, roles, coupling, temperature))
    }
}

impl Circuit {
    /// Encode the circuit as a JSON configuration record.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&CircuitConfig::from(self))?)
    }

    /// Decode a circuit from a JSON configuration record.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CircuitConfig = serde_json::from_str(json)?;
        Circuit::try_from(config)
    }
}

/// Load a circuit from a `.json` configuration record or a circuit
/// description file (any other extension).
pub fn load_circuit(path: &Path) -> Result<Circuit> {
    let content = std::fs::read_to_string(path).map_err(|e| ThermoError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        Circuit::from_json(&content)
    } else {
        Circuit::from_ast(dsl::parse(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::presets;

    #[test]
    fn test_json_round_trip_is_lossless() {
        let mut circuit = presets::demo_circuit();
        circuit.assign_role("R3").unwrap();
        let json = circuit.to_json().unwrap();
        let back = Circuit::from_json(&json).unwrap();
        assert_eq!(back, circuit);
    }

    #[test]
    fn test_component_order_survives() {
        let json = r#"{
            "temperature": 310.0,
            "components": {
                "V1": { "type": "Source", "nominal_value": 5.0 },
                "R1": { "type": "R", "nominal_value": 1000.0, "noise_amplitude": 0.01 },
                "L1": { "type": "L", "nominal_value": 0.1 },
                "C1": { "type": "C", "nominal_value": 1e-6 }
            },
            "coupling_matrix": [[0,0.2,0,0],[0.2,0,0,0],[0,0,0,0],[0,0,0,0]]
        }"#;
        let circuit = Circuit::from_json(json).unwrap();
        let names: Vec<_> = circuit.components().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["V1", "R1", "L1", "C1"]);
        assert_eq!(circuit.coupling_between("R1", "V1").unwrap(), 0.2);
        assert_eq!(circuit.temperature(), 310.0);
    }

    #[test]
    fn test_role_kind_mismatch_rejected() {
        let json = r#"{
            "temperature": 300.0,
            "components": { "R1": { "type": "R", "nominal_value": 1.0 } },
            "roles": { "inductor": "R1" }
        }"#;
        assert!(Circuit::from_json(json).is_err());
    }
}
