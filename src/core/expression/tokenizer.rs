//! Tokenizer for calculation formula expressions.
//!
//! Turns strings like `"$NCSF / $NTC * 100"` or `"($$PSF + $$TCON) / 2"` into
//! tokens. A single `$` prefix marks a raw variable, a double `$$` prefix a
//! reference to another calculation's result.

use std::iter::Peekable;
use std::str::Chars;

/// A token in a formula expression
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A numeric literal (e.g., 123, 45.67, 1.5e10)
    Number(f64),
    /// A raw-variable token: `$ABBR`
    Variable(String),
    /// A nested-calculation token: `$$ABBR`
    CalculationRef(String),
    /// Arithmetic operators: + - * /
    Operator(char),
    OpenParen,
    CloseParen,
}

/// Error during tokenization
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizeError {
    pub message: String,
    pub position: usize,
}

impl TokenizeError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tokenize error at position {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for TokenizeError {}

pub struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    position: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(expression: &'a str) -> Self {
        Self {
            chars: expression.chars().peekable(),
            position: 0,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, TokenizeError> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, TokenizeError> {
        self.skip_whitespace();

        match self.peek() {
            None => Ok(None),
            Some(c) => {
                let token = match c {
                    '(' => {
                        self.advance();
                        Token::OpenParen
                    }
                    ')' => {
                        self.advance();
                        Token::CloseParen
                    }

                    '+' | '-' | '*' | '/' => {
                        let op = self.advance().unwrap();
                        Token::Operator(op)
                    }

                    '$' => self.read_token_reference()?,

                    c if c.is_ascii_digit() => self.read_number()?,

                    c => {
                        return Err(TokenizeError::new(
                            format!("unexpected character: '{}'", c),
                            self.position,
                        ));
                    }
                };
                Ok(Some(token))
            }
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c.is_some() {
            self.position += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Read `$ABBR` (raw variable) or `$$ABBR` (nested calculation).
    ///
    /// The abbreviation is consumed greedily over `[A-Z0-9]`, so token
    /// boundaries are anchored: `$MTG` never matches inside `$MTGX`.
    fn read_token_reference(&mut self) -> Result<Token, TokenizeError> {
        let start_pos = self.position;
        self.advance(); // consume '$'

        let nested = if self.peek() == Some('$') {
            self.advance();
            true
        } else {
            false
        };

        let mut abbreviation = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_uppercase() || c.is_ascii_digit() {
                abbreviation.push(self.advance().unwrap());
            } else {
                break;
            }
        }

        if abbreviation.is_empty() {
            return Err(TokenizeError::new(
                "expected an uppercase abbreviation after '$'",
                start_pos,
            ));
        }

        if nested {
            Ok(Token::CalculationRef(abbreviation))
        } else {
            Ok(Token::Variable(abbreviation))
        }
    }

    /// Read a number (integer, decimal, or scientific notation).
    fn read_number(&mut self) -> Result<Token, TokenizeError> {
        let start_pos = self.position;
        let mut num_str = String::new();

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                num_str.push(self.advance().unwrap());
            } else {
                break;
            }
        }

        if self.peek() == Some('.') {
            num_str.push(self.advance().unwrap());
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    num_str.push(self.advance().unwrap());
                } else {
                    break;
                }
            }
        }

        if let Some(c) = self.peek() {
            if c == 'e' || c == 'E' {
                num_str.push(self.advance().unwrap());
                if let Some(sign) = self.peek() {
                    if sign == '+' || sign == '-' {
                        num_str.push(self.advance().unwrap());
                    }
                }
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        num_str.push(self.advance().unwrap());
                    } else {
                        break;
                    }
                }
            }
        }

        num_str
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| TokenizeError::new(format!("invalid number: {}", num_str), start_pos))
    }
}

/// Convenience function to tokenize an expression string
pub fn tokenize(expression: &str) -> Result<Vec<Token>, TokenizeError> {
    Tokenizer::new(expression).tokenize()
}
