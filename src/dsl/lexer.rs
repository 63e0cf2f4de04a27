//! Lexer (tokenizer) for the circuit description language.

use crate::error::{Result, ThermoError};

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The token's text
    pub text: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

/// Token types in the description language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Component or parameter name
    Identifier,
    /// A number, possibly with an SI suffix
    Number,
    /// A directive (starts with '.')
    Directive,
    /// Equals sign '='
    Equals,
    /// Newline
    Newline,
    /// End of file
    Eof,
}

/// SI multiplier suffixes accepted after a number.
const UNIT_SUFFIXES: [char; 9] = ['p', 'n', 'u', 'µ', 'm', 'k', 'K', 'M', 'G'];

/// Lexer for tokenizing circuit descriptions.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments();

        let (line, column) = (self.line, self.column);
        let token = |kind, text: String| Token {
            kind,
            text,
            line,
            column,
        };

        let Some(&ch) = self.chars.peek() else {
            return Ok(token(TokenKind::Eof, String::new()));
        };

        match ch {
            '\n' => {
                self.advance();
                Ok(token(TokenKind::Newline, "\n".to_string()))
            }
            '=' => {
                self.advance();
                Ok(token(TokenKind::Equals, "=".to_string()))
            }
            '.' => {
                self.advance();
                let name = self.read_identifier();
                if name.is_empty() {
                    return Err(ThermoError::lexer(line, column, "empty directive"));
                }
                Ok(token(TokenKind::Directive, format!(".{}", name)))
            }
            '-' | '+' | '0'..='9' => Ok(token(TokenKind::Number, self.read_number())),
            _ if ch.is_alphabetic() || ch == '_' => {
                Ok(token(TokenKind::Identifier, self.read_identifier()))
            }
            _ => Err(ThermoError::lexer(
                line,
                column,
                format!("unexpected character '{}'", ch),
            )),
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            match ch {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '#' | ';' => {
                    while self.chars.peek().is_some_and(|&c| c != '\n') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn take_while(&mut self, text: &mut String, pred: impl Fn(char) -> bool) {
        while let Some(&ch) = self.chars.peek() {
            if !pred(ch) {
                break;
            }
            text.push(ch);
            self.advance();
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut text = String::new();
        self.take_while(&mut text, |c| c.is_alphanumeric() || c == '_');
        text
    }

    fn read_number(&mut self) -> String {
        let mut text = String::new();

        if let Some(&sign @ ('-' | '+')) = self.chars.peek() {
            text.push(sign);
            self.advance();
        }

        self.take_while(&mut text, |c| c.is_ascii_digit());

        if self.chars.peek() == Some(&'.') {
            text.push('.');
            self.advance();
            self.take_while(&mut text, |c| c.is_ascii_digit());
        }

        if let Some(&e @ ('e' | 'E')) = self.chars.peek() {
            text.push(e);
            self.advance();
            if let Some(&sign @ ('-' | '+')) = self.chars.peek() {
                text.push(sign);
                self.advance();
            }
            self.take_while(&mut text, |c| c.is_ascii_digit());
        }

        if let Some(&suffix) = self.chars.peek() {
            if UNIT_SUFFIXES.contains(&suffix) {
                text.push(suffix);
                self.advance();
            }
        }

        text
    }
}

/// Parse a number string with optional SI suffix.
pub fn parse_value(text: &str) -> Option<f64> {
    let text = text.trim();
    let last = text.chars().last()?;

    let multiplier = match last {
        'p' => 1e-12,
        'n' => 1e-9,
        'u' | 'µ' => 1e-6,
        'm' => 1e-3,
        'k' | 'K' => 1e3,
        'M' => 1e6,
        'G' => 1e9,
        _ => return text.parse::<f64>().ok(),
    };

    let digits = &text[..text.len() - last.len_utf8()];
    digits.parse::<f64>().ok().map(|v| v * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|x| (x - b).abs() <= b.abs() * 1e-10 + 1e-15)
    }

    #[test]
    fn test_parse_value() {
        assert!(approx_eq(parse_value("1k"), 1_000.0));
        assert!(approx_eq(parse_value("100m"), 0.1));
        assert!(approx_eq(parse_value("1u"), 1e-6));
        assert!(approx_eq(parse_value("2.2"), 2.2));
        assert!(approx_eq(parse_value("1e-9"), 1e-9));
        assert!(approx_eq(parse_value("-0.5"), -0.5));
        assert_eq!(parse_value("k"), None);
        assert_eq!(parse_value(""), None);
    }

    #[test]
    fn test_lexer_component_line() {
        let mut lexer = Lexer::new("R1 1k noise=0.01");
        let kinds: Vec<_> = std::iter::from_fn(|| {
            let tok = lexer.next_token().unwrap();
            (tok.kind != TokenKind::Eof).then_some((tok.kind, tok.text))
        })
        .collect();
        assert_eq!(
            kinds,
            vec![
                (TokenKind::Identifier, "R1".to_string()),
                (TokenKind::Number, "1k".to_string()),
                (TokenKind::Identifier, "noise".to_string()),
                (TokenKind::Equals, "=".to_string()),
                (TokenKind::Number, "0.01".to_string()),
            ]
        );
    }

    #[test]
    fn test_lexer_directive_and_position() {
        let mut lexer = Lexer::new("# header\n  .temp 300");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Newline);
        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Directive);
        assert_eq!(tok.text, ".temp");
        assert_eq!((tok.line, tok.column), (2, 3));
    }

    #[test]
    fn test_lexer_rejects_stray_character() {
        let mut lexer = Lexer::new("R1 @");
        lexer.next_token().unwrap();
        assert!(matches!(
            lexer.next_token(),
            Err(ThermoError::LexerError { column: 4, .. })
        ));
    }
}
