//! Core types for circuit representation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a component in its circuit (insertion order).
///
/// Coupling matrix rows and columns use the same indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub usize);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The four element kinds of the series RLC loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// Resistor, nominal value in ohms
    #[serde(rename = "R")]
    Resistor,
    /// Inductor, nominal value in henries
    #[serde(rename = "L")]
    Inductor,
    /// Capacitor, nominal value in farads
    #[serde(rename = "C")]
    Capacitor,
    /// Voltage source, nominal value in volts
    #[serde(rename = "Source")]
    Source,
}

impl ComponentKind {
    /// All kinds, in role resolution order.
    pub const ALL: [ComponentKind; 4] = [
        ComponentKind::Resistor,
        ComponentKind::Inductor,
        ComponentKind::Capacitor,
        ComponentKind::Source,
    ];

    /// Parse a component kind from the first letter of a component name.
    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix.to_ascii_uppercase() {
            'R' => Some(Self::Resistor),
            'L' => Some(Self::Inductor),
            'C' => Some(Self::Capacitor),
            'V' => Some(Self::Source),
            _ => None,
        }
    }

    /// SI unit symbol of the nominal value.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Resistor => "ohm",
            Self::Inductor => "H",
            Self::Capacitor => "F",
            Self::Source => "V",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resistor => "resistor",
            Self::Inductor => "inductor",
            Self::Capacitor => "capacitor",
            Self::Source => "source",
        };
        f.write_str(name)
    }
}

/// Designated component for each role of the loop.
///
/// Filled in as components are added (first of each kind wins) and
/// re-designated explicitly with [`crate::Circuit::assign_role`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Roles {
    pub resistor: Option<ComponentId>,
    pub inductor: Option<ComponentId>,
    pub capacitor: Option<ComponentId>,
    pub source: Option<ComponentId>,
}

impl Roles {
    /// Get the component designated for a kind.
    pub fn get(&self, kind: ComponentKind) -> Option<ComponentId> {
        match kind {
            ComponentKind::Resistor => self.resistor,
            ComponentKind::Inductor => self.inductor,
            ComponentKind::Capacitor => self.capacitor,
            ComponentKind::Source => self.source,
        }
    }

    /// Designate a component for a kind.
    pub fn set(&mut self, kind: ComponentKind, id: ComponentId) {
        let slot = match kind {
            ComponentKind::Resistor => &mut self.resistor,
            ComponentKind::Inductor => &mut self.inductor,
            ComponentKind::Capacitor => &mut self.capacitor,
            ComponentKind::Source => &mut self.source,
        };
        *slot = Some(id);
    }

    /// First kind without a designated component, if any.
    pub fn first_missing(&self) -> Option<ComponentKind> {
        ComponentKind::ALL.into_iter().find(|&kind| self.get(kind).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_prefix() {
        assert_eq!(ComponentKind::from_prefix('r'), Some(ComponentKind::Resistor));
        assert_eq!(ComponentKind::from_prefix('V'), Some(ComponentKind::Source));
        assert_eq!(ComponentKind::from_prefix('Q'), None);
    }

    #[test]
    fn test_roles_first_missing() {
        let mut roles = Roles::default();
        assert_eq!(roles.first_missing(), Some(ComponentKind::Resistor));
        roles.set(ComponentKind::Resistor, ComponentId(0));
        roles.set(ComponentKind::Inductor, ComponentId(1));
        roles.set(ComponentKind::Source, ComponentId(2));
        assert_eq!(roles.first_missing(), Some(ComponentKind::Capacitor));
    }
}
