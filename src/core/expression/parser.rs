//! Parser for calculation formula expressions.
//!
//! Converts a token sequence into an AST using recursive descent with
//! standard operator precedence and left-to-right associativity.

use super::tokenizer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// AST node for a formula expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal
    Number(f64),
    /// A raw-variable reference: `$ABBR`
    Variable(String),
    /// A nested-calculation reference: `$$ABBR`
    CalculationRef(String),
    /// Binary operation: left op right
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary negation: -expr
    Negate(Box<Expr>),
}

impl Expr {
    /// Raw-variable abbreviations referenced by this expression, in first
    /// appearance order, deduplicated.
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect(&mut out, &mut Vec::new());
        out
    }

    /// Nested-calculation abbreviations referenced by this expression, in
    /// first appearance order, deduplicated.
    pub fn calculation_refs(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect(&mut Vec::new(), &mut out);
        out
    }

    fn collect(&self, variables: &mut Vec<String>, calculations: &mut Vec<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(abbr) => {
                if !variables.contains(abbr) {
                    variables.push(abbr.clone());
                }
            }
            Expr::CalculationRef(abbr) => {
                if !calculations.contains(abbr) {
                    calculations.push(abbr.clone());
                }
            }
            Expr::BinaryOp { left, right, .. } => {
                left.collect(variables, calculations);
                right.collect(variables, calculations);
            }
            Expr::Negate(operand) => operand.collect(variables, calculations),
        }
    }
}

/// Error during parsing
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "parse error at token {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for ParseError {}

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    pub fn parse(mut self) -> Result<Expr, ParseError> {
        if self.tokens.is_empty() {
            return Err(ParseError::new("empty expression", 0));
        }
        let expr = self.term()?;

        if !self.is_at_end() {
            return Err(ParseError::new(
                format!("unexpected token after expression: {:?}", self.peek()),
                self.position,
            ));
        }

        Ok(expr)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<&Token> {
        if !self.is_at_end() {
            self.position += 1;
        }
        self.tokens.get(self.position - 1)
    }

    fn match_operator(&mut self, ops: &[char]) -> Option<char> {
        if let Some(Token::Operator(c)) = self.peek() {
            if ops.contains(c) {
                let op = *c;
                self.advance();
                return Some(op);
            }
        }
        None
    }

    /// Term: factor (( "+" | "-" ) factor)*
    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.factor()?;

        while let Some(op) = self.match_operator(&['+', '-']) {
            let right = self.factor()?;
            left = Expr::BinaryOp {
                op: if op == '+' { BinOp::Add } else { BinOp::Sub },
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Factor: unary (( "*" | "/" ) unary)*
    fn factor(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;

        while let Some(op) = self.match_operator(&['*', '/']) {
            let right = self.unary()?;
            left = Expr::BinaryOp {
                op: if op == '*' { BinOp::Mul } else { BinOp::Div },
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Unary: ( "-" ) unary | primary
    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_operator(&['-']).is_some() {
            let operand = self.unary()?;
            Ok(Expr::Negate(Box::new(operand)))
        } else {
            self.primary()
        }
    }

    /// Primary: number | variable | calculation ref | "(" term ")"
    fn primary(&mut self) -> Result<Expr, ParseError> {
        let position = self.position;
        match self.advance().cloned() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Variable(abbr)) => Ok(Expr::Variable(abbr)),
            Some(Token::CalculationRef(abbr)) => Ok(Expr::CalculationRef(abbr)),
            Some(Token::OpenParen) => {
                let expr = self.term()?;
                match self.advance() {
                    Some(Token::CloseParen) => Ok(expr),
                    _ => Err(ParseError::new("expected ')'", self.position)),
                }
            }
            Some(token) => Err(ParseError::new(
                format!("unexpected token: {:?}", token),
                position,
            )),
            None => Err(ParseError::new("unexpected end of expression", position)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tokenizer::tokenize;
    use super::*;

    fn parse(expression: &str) -> Result<Expr, ParseError> {
        let tokens = tokenize(expression).expect("tokenize");
        Parser::new(tokens).parse()
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse("42").unwrap(), Expr::Number(42.0));
    }

    #[test]
    fn test_parse_precedence() {
        // $X + $Y * 2 parses as $X + ($Y * 2)
        let expr = parse("$X + $Y * 2").unwrap();
        assert_eq!(
            expr,
            Expr::BinaryOp {
                op: BinOp::Add,
                left: Box::new(Expr::Variable("X".to_string())),
                right: Box::new(Expr::BinaryOp {
                    op: BinOp::Mul,
                    left: Box::new(Expr::Variable("Y".to_string())),
                    right: Box::new(Expr::Number(2.0)),
                }),
            }
        );
    }

    #[test]
    fn test_parse_left_associativity() {
        // 10 - 4 - 3 parses as (10 - 4) - 3
        let expr = parse("10 - 4 - 3").unwrap();
        assert_eq!(
            expr,
            Expr::BinaryOp {
                op: BinOp::Sub,
                left: Box::new(Expr::BinaryOp {
                    op: BinOp::Sub,
                    left: Box::new(Expr::Number(10.0)),
                    right: Box::new(Expr::Number(4.0)),
                }),
                right: Box::new(Expr::Number(3.0)),
            }
        );
    }

    #[test]
    fn test_parse_parentheses() {
        let expr = parse("($A + $B) / 2").unwrap();
        assert_eq!(
            expr,
            Expr::BinaryOp {
                op: BinOp::Div,
                left: Box::new(Expr::BinaryOp {
                    op: BinOp::Add,
                    left: Box::new(Expr::Variable("A".to_string())),
                    right: Box::new(Expr::Variable("B".to_string())),
                }),
                right: Box::new(Expr::Number(2.0)),
            }
        );
    }

    #[test]
    fn test_parse_unary_minus() {
        let expr = parse("-$A").unwrap();
        assert_eq!(
            expr,
            Expr::Negate(Box::new(Expr::Variable("A".to_string())))
        );
    }

    #[test]
    fn test_parse_collects_references() {
        let expr = parse("$$PSF + $NTC * $$PSF - $NTC").unwrap();
        assert_eq!(expr.variables(), vec!["NTC".to_string()]);
        assert_eq!(expr.calculation_refs(), vec!["PSF".to_string()]);
    }

    #[test]
    fn test_parse_error_unbalanced_parens() {
        let err = parse("($A + 1").unwrap_err();
        assert!(err.message.contains("')'"));
    }

    #[test]
    fn test_parse_error_trailing_tokens() {
        let err = parse("1 2").unwrap_err();
        assert!(err.message.contains("unexpected token after"));
    }

    #[test]
    fn test_parse_error_dangling_operator() {
        assert!(parse("$A +").is_err());
        assert!(parse("* $A").is_err());
    }

    #[test]
    fn test_parse_error_empty() {
        assert!(parse("").is_err());
    }
}
