//! Abstract Syntax Tree types for the circuit description language.

use std::collections::HashMap;

use crate::circuit::ComponentKind;

/// Complete AST representation of a parsed circuit description.
#[derive(Debug, Clone, Default)]
pub struct CircuitAst {
    /// Ambient temperature from `.temp`, if given
    pub temperature: Option<f64>,
    /// Component definitions in file order
    pub components: Vec<ComponentDef>,
    /// Coupling definitions from `.couple`
    pub couplings: Vec<CouplingDef>,
    /// Explicit role designations from `.role`
    pub roles: Vec<RoleDef>,
}

impl CircuitAst {
    /// Create a new empty circuit AST.
    pub fn new() -> Self {
        Self::default()
    }
}

/// A component line: `<name> <value> [param=value ...]`.
#[derive(Debug, Clone)]
pub struct ComponentDef {
    /// Kind derived from the name prefix
    pub kind: ComponentKind,
    /// Unique component name
    pub name: String,
    /// Nominal value in SI units
    pub value: f64,
    /// Named parameters (`noise`, `tc`)
    pub params: HashMap<String, f64>,
    /// Source line number for error reporting
    pub line: usize,
}

/// A `.couple <first> <second> <strength>` directive.
#[derive(Debug, Clone)]
pub struct CouplingDef {
    pub first: String,
    pub second: String,
    pub strength: f64,
    pub line: usize,
}

/// A `.role <name>` directive.
#[derive(Debug, Clone)]
pub struct RoleDef {
    pub name: String,
    pub line: usize,
}
