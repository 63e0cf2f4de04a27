//! The circuit: owned components, role designations, couplings and
//! ambient temperature.

use super::component::Component;
use super::coupling::CouplingMatrix;
use super::types::{ComponentId, ComponentKind, Roles};
use crate::dsl::CircuitAst;
use crate::error::{Result, ThermoError};
use crate::REFERENCE_TEMPERATURE;

/// A single-loop RLC circuit ready for simulation.
///
/// Components are kept in insertion order; that order indexes the
/// coupling matrix. Each of the four loop roles points at one component.
#[derive(Debug, Clone, PartialEq)]
pub struct Circuit {
    /// All components, in insertion order
    components: Vec<Component>,
    /// Component designated for each loop role
    roles: Roles,
    /// Advisory component couplings
    coupling: CouplingMatrix,
    /// Ambient temperature in kelvin
    temperature: f64,
}

impl Default for Circuit {
    fn default() -> Self {
        Self {
            components: Vec::new(),
            roles: Roles::default(),
            coupling: CouplingMatrix::default(),
            temperature: REFERENCE_TEMPERATURE,
        }
    }
}

impl Circuit {
    /// Create an empty circuit at the given temperature.
    pub fn new(temperature: f64) -> Result<Self> {
        check_temperature(temperature)?;
        Ok(Self {
            temperature,
            ..Self::default()
        })
    }

    /// Build a circuit from a parsed description.
    pub fn from_ast(ast: CircuitAst) -> Result<Self> {
        let mut circuit = Self::new(ast.temperature.unwrap_or(REFERENCE_TEMPERATURE))?;

        for def in ast.components {
            let noise = def.params.get("noise").copied().unwrap_or(0.0);
            let tc = def
                .params
                .get("tc")
                .or_else(|| def.params.get("tempco"))
                .copied()
                .unwrap_or(0.0);
            let component = Component::new(def.name, def.kind, def.value, noise, tc)?;
            circuit.add_component(component)?;
        }

        for coupling in ast.couplings {
            circuit.set_coupling(&coupling.first, &coupling.second, coupling.strength)?;
        }

        for role in ast.roles {
            circuit.assign_role(&role.name)?;
        }

        Ok(circuit)
    }

    /// Assemble a circuit from already-validated parts.
    pub(crate) fn from_parts(
        components: Vec<Component>,
        roles: Roles,
        coupling: CouplingMatrix,
        temperature: f64,
    ) -> Self {
        Self {
            components,
            roles,
            coupling,
            temperature,
        }
    }

    /// Add a component. The first component of each kind claims that role.
    pub fn add_component(&mut self, component: Component) -> Result<ComponentId> {
        if self.find(&component.name).is_some() {
            return Err(ThermoError::DuplicateComponent {
                name: component.name,
            });
        }
        let id = ComponentId(self.components.len());
        if self.roles.get(component.kind).is_none() {
            self.roles.set(component.kind, id);
        }
        self.components.push(component);
        Ok(id)
    }

    /// Builder form of [`Circuit::add_component`].
    pub fn with_component(mut self, component: Component) -> Result<Self> {
        self.add_component(component)?;
        Ok(self)
    }

    /// Designate the named component for its kind's role.
    pub fn assign_role(&mut self, name: &str) -> Result<()> {
        let id = self.require(name)?;
        let kind = self.components[id.0].kind;
        self.roles.set(kind, id);
        Ok(())
    }

    /// Current role designations.
    pub fn roles(&self) -> Roles {
        self.roles
    }

    /// The component playing `kind`'s role in the loop.
    pub fn role_component(&self, kind: ComponentKind) -> Result<&Component> {
        self.roles
            .get(kind)
            .map(|id| &self.components[id.0])
            .ok_or(ThermoError::MissingComponent { kind })
    }

    /// Check that every loop role is filled.
    pub fn require_roles(&self) -> Result<()> {
        match self.roles.first_missing() {
            Some(kind) => Err(ThermoError::MissingComponent { kind }),
            None => Ok(()),
        }
    }

    /// All components in insertion order.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the circuit has no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Find a component ID by name.
    pub fn find(&self, name: &str) -> Option<ComponentId> {
        self.components.iter().position(|c| c.name == name).map(ComponentId)
    }

    /// Get a component by name.
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.find(name).map(|id| &self.components[id.0])
    }

    /// Replace the nominal value of a component.
    ///
    /// Used by calibration loops and ensemble overrides between runs.
    pub fn set_nominal_value(&mut self, name: &str, value: f64) -> Result<()> {
        let id = self.require(name)?;
        if !value.is_finite() {
            return Err(ThermoError::invalid_parameter(
                name,
                format!("nominal value must be finite, got {}", value),
            ));
        }
        self.components[id.0].nominal_value = value;
        Ok(())
    }

    /// Apply a set of nominal value overrides.
    pub fn apply_overrides(&mut self, overrides: &[(String, f64)]) -> Result<()> {
        for (name, value) in overrides {
            self.set_nominal_value(name, *value)?;
        }
        Ok(())
    }

    /// Ambient temperature in kelvin.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Change the ambient temperature.
    pub fn set_temperature(&mut self, temperature: f64) -> Result<()> {
        check_temperature(temperature)?;
        self.temperature = temperature;
        Ok(())
    }

    /// The coupling matrix.
    pub fn coupling(&self) -> &CouplingMatrix {
        &self.coupling
    }

    /// Coupling strength between two named components.
    pub fn coupling_between(&self, first: &str, second: &str) -> Result<f64> {
        let i = self.require(first)?;
        let j = self.require(second)?;
        Ok(self.coupling.get(i.0, j.0))
    }

    /// Set the coupling between two named components on both sides of the
    /// diagonal. The matrix grows to cover every component first.
    pub fn set_coupling(&mut self, first: &str, second: &str, strength: f64) -> Result<()> {
        let i = self.require(first)?;
        let j = self.require(second)?;
        self.coupling.grow(self.components.len());
        self.coupling.set_symmetric(i.0, j.0, strength);
        Ok(())
    }

    fn require(&self, name: &str) -> Result<ComponentId> {
        self.find(name).ok_or_else(|| ThermoError::ComponentNotFound {
            name: name.to_string(),
        })
    }
}

pub(crate) fn check_temperature(temperature: f64) -> Result<()> {
    if temperature.is_finite() && temperature > 0.0 {
        Ok(())
    } else {
        Err(ThermoError::InvalidTemperature { value: temperature })
    }
}
