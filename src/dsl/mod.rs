//! Circuit description language.
//!
//! A small line-oriented, human-editable format for stochastic RLC
//! circuits. Component kinds come from the first letter of the name.
//!
//! # Grammar Overview
//!
//! ```text
//! circuit     = { line }
//! line        = comment | directive | component | empty
//! comment     = ('#' | ';') { any_char }
//! directive   = ".temp" value
//!             | ".couple" name name value
//!             | ".role" name
//! component   = name value { param '=' value }
//!
//! name        = ('R' | 'L' | 'C' | 'V') { letter | digit | '_' }
//! param       = "noise" | "tc" | "tempco"
//! value       = number [unit_suffix]
//! unit_suffix = 'p' | 'n' | 'u' | 'm' | 'k' | 'M' | 'G'
//! ```
//!
//! # Example
//!
//! ```text
//! # Series RLC at room temperature
//! .temp 300
//! R1 1k   noise=0.01  tc=0.001
//! L1 100m noise=0.005 tc=0.0005
//! C1 1u   noise=0.02  tc=0.002
//! V1 5    noise=0.001 tc=0.0001
//! .couple R1 L1 0.1
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{parse_value, Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::error::Result;

/// Parse a circuit description string into an AST.
pub fn parse(input: &str) -> Result<CircuitAst> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer)?;
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Circuit, ComponentKind};

    #[test]
    fn test_description_builds_circuit() {
        let input = "\
.temp 320
R1 1k noise=0.01 tc=0.001
R2 2k
L1 100m
C1 1u
V1 5
.couple R1 C1 0.2
.role R2
";
        let circuit = Circuit::from_ast(parse(input).unwrap()).unwrap();
        assert_eq!(circuit.temperature(), 320.0);
        assert_eq!(circuit.len(), 5);
        assert_eq!(circuit.role_component(ComponentKind::Resistor).unwrap().name, "R2");
        assert_eq!(circuit.coupling_between("C1", "R1").unwrap(), 0.2);
        assert_eq!(circuit.component("R1").unwrap().noise_amplitude, 0.01);
    }
}
