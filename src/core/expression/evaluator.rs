//! Evaluator for parsed formula expressions.
//!
//! Evaluates an AST against a set of token bindings. The binding mode is a
//! first-class switch: `Validate` substitutes a neutral `1` for every token
//! that has no binding (a syntax self-test, nothing more), while `Evaluate`
//! treats a missing binding as a hard `MissingVariable` failure.

use std::collections::HashMap;

use super::parser::{BinOp, Expr};
use crate::error::ErrorKind;

/// Substitution mode for one evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Syntax validation only: unbound tokens become the literal 1.
    Validate,
    /// Real evaluation: unbound tokens are an error.
    Evaluate,
}

/// Token-to-value bindings for one expression evaluation.
///
/// Raw variables and nested-calculation results live in separate namespaces,
/// so `$X` and `$$X` never collide.
#[derive(Debug, Clone)]
pub struct Bindings {
    variables: HashMap<String, f64>,
    calculations: HashMap<String, f64>,
    mode: EvaluationMode,
}

impl Bindings {
    pub fn validation() -> Self {
        Self {
            variables: HashMap::new(),
            calculations: HashMap::new(),
            mode: EvaluationMode::Validate,
        }
    }

    pub fn evaluation() -> Self {
        Self {
            variables: HashMap::new(),
            calculations: HashMap::new(),
            mode: EvaluationMode::Evaluate,
        }
    }

    pub fn bind_variable(&mut self, abbreviation: impl Into<String>, value: f64) {
        self.variables.insert(abbreviation.into(), value);
    }

    pub fn bind_calculation(&mut self, abbreviation: impl Into<String>, value: f64) {
        self.calculations.insert(abbreviation.into(), value);
    }

    fn variable(&self, abbreviation: &str) -> Result<f64, ErrorKind> {
        match self.variables.get(abbreviation) {
            Some(&value) => Ok(value),
            None => match self.mode {
                EvaluationMode::Validate => Ok(1.0),
                EvaluationMode::Evaluate => {
                    Err(ErrorKind::MissingVariable(abbreviation.to_string()))
                }
            },
        }
    }

    fn calculation(&self, abbreviation: &str) -> Result<f64, ErrorKind> {
        match self.calculations.get(abbreviation) {
            Some(&value) => Ok(value),
            None => match self.mode {
                EvaluationMode::Validate => Ok(1.0),
                EvaluationMode::Evaluate => Err(ErrorKind::CalculationNotFound(format!(
                    "$${abbreviation}"
                ))),
            },
        }
    }
}

/// Evaluate an expression against the given bindings.
///
/// Division producing Infinity/NaN is allowed to propagate; the resolver
/// flags non-finite results instead of coercing them.
pub fn evaluate(expr: &Expr, bindings: &Bindings) -> Result<f64, ErrorKind> {
    match expr {
        Expr::Number(n) => Ok(*n),

        Expr::Variable(abbr) => bindings.variable(abbr),

        Expr::CalculationRef(abbr) => bindings.calculation(abbr),

        Expr::BinaryOp { op, left, right } => {
            let left_val = evaluate(left, bindings)?;
            let right_val = evaluate(right, bindings)?;
            Ok(match op {
                BinOp::Add => left_val + right_val,
                BinOp::Sub => left_val - right_val,
                BinOp::Mul => left_val * right_val,
                BinOp::Div => left_val / right_val,
            })
        }

        Expr::Negate(operand) => Ok(-evaluate(operand, bindings)?),
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;

    #[test]
    fn test_evaluate_with_bindings() {
        let expr = parse("$X + $Y * 2").unwrap();
        let mut bindings = Bindings::evaluation();
        bindings.bind_variable("X", 3.0);
        bindings.bind_variable("Y", 4.0);
        assert_eq!(evaluate(&expr, &bindings).unwrap(), 11.0);
    }

    #[test]
    fn test_evaluate_nested_calculation_binding() {
        let expr = parse("($$PSF + $$TCON) / 2").unwrap();
        let mut bindings = Bindings::evaluation();
        bindings.bind_calculation("PSF", 50.0);
        bindings.bind_calculation("TCON", 30.0);
        assert_eq!(evaluate(&expr, &bindings).unwrap(), 40.0);
    }

    #[test]
    fn test_variable_and_calculation_namespaces_are_separate() {
        let expr = parse("$X + $$X").unwrap();
        let mut bindings = Bindings::evaluation();
        bindings.bind_variable("X", 1.0);
        bindings.bind_calculation("X", 10.0);
        assert_eq!(evaluate(&expr, &bindings).unwrap(), 11.0);
    }

    #[test]
    fn test_missing_variable_in_evaluate_mode() {
        let expr = parse("$UNKNOWN / 0").unwrap();
        let bindings = Bindings::evaluation();
        assert_eq!(
            evaluate(&expr, &bindings),
            Err(ErrorKind::MissingVariable("UNKNOWN".to_string()))
        );
    }

    #[test]
    fn test_missing_variable_in_validate_mode_is_one() {
        let expr = parse("$UNKNOWN * 3").unwrap();
        let bindings = Bindings::validation();
        assert_eq!(evaluate(&expr, &bindings).unwrap(), 3.0);
    }

    #[test]
    fn test_division_result_propagates_non_finite() {
        let expr = parse("1 / 0").unwrap();
        let bindings = Bindings::evaluation();
        assert!(evaluate(&expr, &bindings).unwrap().is_infinite());
    }

    #[test]
    fn test_unary_minus() {
        let expr = parse("-$X + 5").unwrap();
        let mut bindings = Bindings::evaluation();
        bindings.bind_variable("X", 2.0);
        assert_eq!(evaluate(&expr, &bindings).unwrap(), 3.0);
    }
}
