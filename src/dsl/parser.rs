//! Parser for the circuit description language.

use std::collections::HashMap;

use super::ast::*;
use super::lexer::{parse_value, Lexer, Token, TokenKind};
use crate::circuit::ComponentKind;
use crate::error::{Result, ThermoError};

/// Parameter names accepted on component lines.
const COMPONENT_PARAMS: [&str; 3] = ["noise", "tc", "tempco"];

/// Parser for circuit descriptions.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser with the given lexer.
    pub fn new(mut lexer: Lexer<'a>) -> Result<Self> {
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    /// Parse the entire circuit description.
    pub fn parse(&mut self) -> Result<CircuitAst> {
        let mut ast = CircuitAst::new();

        while self.current.kind != TokenKind::Eof {
            match self.current.kind {
                TokenKind::Newline => {
                    self.advance()?;
                    continue;
                }
                TokenKind::Directive => self.parse_directive(&mut ast)?,
                TokenKind::Identifier => {
                    let component = self.parse_component()?;
                    ast.components.push(component);
                }
                _ => {
                    return Err(ThermoError::parse(
                        self.current.line,
                        format!("unexpected token: {:?}", self.current.text),
                    ));
                }
            }

            match self.current.kind {
                TokenKind::Newline => self.advance()?,
                TokenKind::Eof => {}
                _ => {
                    return Err(ThermoError::parse(
                        self.current.line,
                        format!("unexpected trailing token: {:?}", self.current.text),
                    ));
                }
            }
        }

        Ok(ast)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.current.kind == kind {
            let tok = self.current.clone();
            self.advance()?;
            Ok(tok)
        } else {
            Err(ThermoError::parse(
                self.current.line,
                format!("expected {:?}, got {:?}", kind, self.current.kind),
            ))
        }
    }

    fn expect_value(&mut self) -> Result<f64> {
        let tok = self.expect(TokenKind::Number)?;
        parse_value(&tok.text)
            .ok_or_else(|| ThermoError::parse(tok.line, format!("invalid number: {}", tok.text)))
    }

    fn parse_directive(&mut self, ast: &mut CircuitAst) -> Result<()> {
        let directive = self.current.text.to_lowercase();
        let line = self.current.line;
        self.advance()?;

        match directive.as_str() {
            ".temp" | ".temperature" => {
                if ast.temperature.is_some() {
                    return Err(ThermoError::parse(line, "temperature set twice"));
                }
                ast.temperature = Some(self.expect_value()?);
            }
            ".couple" | ".coupling" => {
                let first = self.expect(TokenKind::Identifier)?.text;
                let second = self.expect(TokenKind::Identifier)?.text;
                let strength = self.expect_value()?;
                ast.couplings.push(CouplingDef {
                    first,
                    second,
                    strength,
                    line,
                });
            }
            ".role" => {
                let name = self.expect(TokenKind::Identifier)?.text;
                ast.roles.push(RoleDef { name, line });
            }
            _ => {
                return Err(ThermoError::parse(
                    line,
                    format!("unknown directive: {}", directive),
                ));
            }
        }

        Ok(())
    }

    fn parse_component(&mut self) -> Result<ComponentDef> {
        let name = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        let kind = name
            .chars()
            .next()
            .and_then(ComponentKind::from_prefix)
            .ok_or_else(|| ThermoError::UnknownComponentType {
                name: name.clone(),
                line,
            })?;

        let value = self.expect_value()?;

        let mut params = HashMap::new();
        while self.current.kind == TokenKind::Identifier {
            let param = self.current.text.to_lowercase();
            self.advance()?;
            if !COMPONENT_PARAMS.contains(&param.as_str()) {
                return Err(ThermoError::parse(
                    line,
                    format!("unknown parameter '{}' for component '{}'", param, name),
                ));
            }
            self.expect(TokenKind::Equals)?;
            let v = self.expect_value()?;
            params.insert(param, v);
        }

        Ok(ComponentDef {
            kind,
            name,
            value,
            params,
            line,
        })
    }
}
