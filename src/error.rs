use serde::Serialize;
use thiserror::Error;

pub type KarewaResult<T> = Result<T, KarewaError>;

/// Expected domain failures during formula resolution.
///
/// These are carried inside an `EvaluationOutcome` (`is_valid: false`) rather
/// than surfaced as fatal errors, so callers can render a zero result with a
/// diagnostic flag.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail")]
pub enum ErrorKind {
    /// A raw variable has no filter, a malformed filter, or no backing data.
    #[error("missing variable: ${0}")]
    MissingVariable(String),

    /// A calculation transitively references itself. Carries the cycle path.
    #[error("circular dependency: {0}")]
    CircularDependency(String),

    /// Malformed arithmetic expression.
    #[error("expression syntax error: {0}")]
    ExpressionSyntax(String),

    /// A referenced calculation id or abbreviation does not exist.
    #[error("calculation not found: {0}")]
    CalculationNotFound(String),

    /// The expression evaluated to Infinity or NaN.
    #[error("expression produced a non-finite result")]
    NonFiniteResult,

    /// Recursion exceeded the per-pass depth bound.
    #[error("maximum resolution depth exceeded")]
    DepthExceeded,

    /// The calculation has no formula expression to evaluate.
    #[error("calculation has no formula expression")]
    MissingFormula,
}

#[derive(Error, Debug)]
pub enum KarewaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(ErrorKind),
}

impl KarewaError {
    /// The domain error kind when this is an expected evaluation failure,
    /// `None` for fatal faults (IO, store unavailability) that must bubble.
    pub fn kind(&self) -> Option<&ErrorKind> {
        match self {
            KarewaError::Evaluation(kind) => Some(kind),
            _ => None,
        }
    }
}

impl From<ErrorKind> for KarewaError {
    fn from(kind: ErrorKind) -> Self {
        KarewaError::Evaluation(kind)
    }
}
