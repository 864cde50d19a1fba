//! Formula expression engine: tokenizer, recursive-descent parser, and
//! binding-based evaluator for calculation expressions.
//!
//! Grammar: decimal literals, `+ - * / ( )`, unary minus, `$ABBR` raw
//! variables and `$$ABBR` nested-calculation references.

pub mod evaluator;
pub mod parser;
pub mod tokenizer;

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ErrorKind;

pub use evaluator::{evaluate, Bindings, EvaluationMode};
pub use parser::{BinOp, Expr, Parser};
pub use tokenizer::{tokenize, Token};

/// Parse an expression string into an AST.
pub fn parse(expression: &str) -> Result<Expr, ErrorKind> {
    let tokens =
        tokenize(expression).map_err(|e| ErrorKind::ExpressionSyntax(e.to_string()))?;
    Parser::new(tokens)
        .parse()
        .map_err(|e| ErrorKind::ExpressionSyntax(e.to_string()))
}

/// Variable and calculation tokens found in an expression, scanned textually.
///
/// Load-time cross-check against a formula's declared dependency edges; the
/// evaluator itself works from the parsed AST, never from this scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedTokens {
    pub variables: Vec<String>,
    pub calculations: Vec<String>,
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\${1,2}[A-Z0-9]+").expect("valid token regex"))
}

/// Scan an expression for `$ABBR` / `$$ABBR` tokens without parsing it.
pub fn scan_tokens(expression: &str) -> ScannedTokens {
    let mut scanned = ScannedTokens::default();
    for token in token_regex().find_iter(expression) {
        let text = token.as_str();
        if let Some(abbr) = text.strip_prefix("$$") {
            if !scanned.calculations.iter().any(|a| a == abbr) {
                scanned.calculations.push(abbr.to_string());
            }
        } else if let Some(abbr) = text.strip_prefix('$') {
            if !scanned.variables.iter().any(|a| a == abbr) {
                scanned.variables.push(abbr.to_string());
            }
        }
    }
    scanned
}
