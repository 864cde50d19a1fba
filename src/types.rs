use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ErrorKind;

//==============================================================================
// Calculation model
//==============================================================================

/// Which aggregate source feeds a calculation's variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationType {
    General,
    Contract,
}

/// Presentation hint only, never evaluation-affecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayForm {
    Normal,
    Percentage,
    Amount,
}

/// Contract properties a filter may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContractProperty {
    TotalAmount,
    MinAmount,
    MaxAmount,
    TotalOrMaxAmount,
    Supplier,
    OrganizerAdministrativeUnit,
    ApplicantAdministrativeUnit,
}

impl ContractProperty {
    /// Amount properties compare and sum numerically; the rest are
    /// reference/text properties.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ContractProperty::TotalAmount
                | ContractProperty::MinAmount
                | ContractProperty::MaxAmount
                | ContractProperty::TotalOrMaxAmount
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    Ref,
    String,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    #[default]
    Equal,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    NotEqual,
}

impl FilterOperator {
    pub fn compare<T: PartialOrd>(self, left: &T, right: &T) -> bool {
        match self {
            FilterOperator::Equal => left == right,
            FilterOperator::Greater => left > right,
            FilterOperator::GreaterEqual => left >= right,
            FilterOperator::Less => left < right,
            FilterOperator::LessEqual => left <= right,
            FilterOperator::NotEqual => left != right,
        }
    }
}

/// How a filter reduces its matching contracts to one scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregateKind {
    /// Number of matching contracts.
    #[default]
    Count,
    /// Sum of the filtered numeric property over matching contracts.
    Sum,
}

/// Defines how one raw variable is computed from contract data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    /// Abbreviation of the variable this filter feeds (without the `$`).
    pub variable: String,
    pub property: ContractProperty,
    pub property_type: PropertyType,
    #[serde(default)]
    pub operator: FilterOperator,
    /// Literal to compare against (STRING / NUMBER filters).
    #[serde(default)]
    pub value: Option<String>,
    /// Referenced entity id (REF filters).
    #[serde(default)]
    pub reference: Option<String>,
    /// Model the reference points at (REF filters).
    #[serde(default)]
    pub on_model: Option<String>,
    #[serde(default)]
    pub aggregate: AggregateKind,
}

impl Filter {
    /// A malformed filter resolves its variable to the "missing" sentinel
    /// instead of failing the whole store query.
    pub fn is_well_formed(&self) -> bool {
        match self.property_type {
            PropertyType::Ref => self.reference.is_some(),
            PropertyType::String => self.value.is_some(),
            PropertyType::Number => self
                .value
                .as_deref()
                .is_some_and(|v| v.parse::<f64>().is_ok()),
        }
    }
}

/// One band of a percentage scale: raw percentages in `[min, max)` map to
/// `value`. A raw value outside every band passes through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleBand {
    pub min: f64,
    pub max: f64,
    pub value: f64,
}

impl ScaleBand {
    pub fn contains(&self, percentage: f64) -> bool {
        percentage >= self.min && percentage < self.max
    }
}

/// A raw-variable declaration inside a formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaVariable {
    pub abbreviation: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// The algebraic expression a calculation owns, plus its declared inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    /// Mix of arithmetic, `$ABBR` raw-variable tokens and `$$ABBR`
    /// nested-calculation tokens.
    pub expression: String,
    #[serde(default)]
    pub variables: Vec<FormulaVariable>,
    /// Declared dependency edges (calculation ids). Kept consistent with the
    /// tokens scanned from `expression` at load time.
    #[serde(default)]
    pub calculations: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

/// A named, organization-scoped computation unit; one graph node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calculation {
    pub id: String,
    pub organization: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Short unique token (per organization) other formulas reference.
    pub abbreviation: String,
    #[serde(rename = "type")]
    pub calculation_type: CalculationType,
    pub display_form: DisplayForm,
    /// Disabled calculations are excluded from reporting sets but stay
    /// resolvable by direct reference.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Exactly one locked calculation per organization is the corruption
    /// index root, looked up by query.
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub formula: Option<Formula>,
    #[serde(default)]
    pub has_percent_scale: bool,
    #[serde(default)]
    pub scale: Vec<ScaleBand>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub deleted: bool,
}

impl Calculation {
    pub fn filter_for(&self, abbreviation: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.variable == abbreviation)
    }

    /// Map a raw percentage through the scale bands. No matching band means
    /// the raw percentage passes through unchanged.
    pub fn scale_value(&self, raw: f64) -> f64 {
        if !self.has_percent_scale {
            return raw;
        }
        match self.scale.iter().find(|b| b.contains(raw)) {
            Some(band) => band.value,
            None => raw,
        }
    }
}

//==============================================================================
// Aggregate sources
//==============================================================================

/// Government contract record, the source every raw variable aggregates over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub organization: String,
    pub supplier: String,
    #[serde(default)]
    pub organizer_administrative_unit: Option<String>,
    #[serde(default)]
    pub applicant_administrative_unit: Option<String>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub min_amount: Option<f64>,
    #[serde(default)]
    pub max_amount: Option<f64>,
    pub signed_at: NaiveDate,
    #[serde(default)]
    pub deleted: bool,
}

impl Contract {
    /// Numeric reading of an amount property, `None` when the contract does
    /// not carry it.
    pub fn amount(&self, property: ContractProperty) -> Option<f64> {
        match property {
            ContractProperty::TotalAmount => Some(self.total_amount),
            ContractProperty::MinAmount => self.min_amount,
            ContractProperty::MaxAmount => self.max_amount,
            // Open-ended contracts carry a max instead of a total.
            ContractProperty::TotalOrMaxAmount => {
                if self.total_amount != 0.0 {
                    Some(self.total_amount)
                } else {
                    self.max_amount
                }
            }
            _ => None,
        }
    }

    /// Text/reference reading of a non-amount property.
    pub fn reference(&self, property: ContractProperty) -> Option<&str> {
        match property {
            ContractProperty::Supplier => Some(self.supplier.as_str()),
            ContractProperty::OrganizerAdministrativeUnit => {
                self.organizer_administrative_unit.as_deref()
            }
            ContractProperty::ApplicantAdministrativeUnit => {
                self.applicant_administrative_unit.as_deref()
            }
            _ => None,
        }
    }
}

/// Government term used to scope aggregate queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdministrationPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: String,
    pub administration_period: AdministrationPeriod,
}

//==============================================================================
// Query context and outcomes
//==============================================================================

/// Scope of one resolution pass: organization plus administration period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryContext {
    pub organization: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

impl QueryContext {
    pub fn new(organization: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            organization: organization.into(),
            period_start: start,
            period_end: end,
        }
    }

    /// Default query for an organization: its own administration period,
    /// optionally overridden at either end.
    pub fn for_organization(
        organization: &Organization,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Self {
        Self {
            organization: organization.id.clone(),
            period_start: from.unwrap_or(organization.administration_period.start),
            period_end: to.unwrap_or(organization.administration_period.end),
        }
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.period_start && date <= self.period_end
    }
}

/// Qualitative reading of a corruption index value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorruptionLevel {
    #[serde(rename = "BAJO")]
    Low,
    #[serde(rename = "MEDIO")]
    Medium,
    #[serde(rename = "ALTO")]
    High,
}

impl CorruptionLevel {
    /// Classify an index value: up to 55 is low, up to 75 medium, above high.
    pub fn classify(value: f64) -> Self {
        if value <= 55.0 {
            CorruptionLevel::Low
        } else if value <= 75.0 {
            CorruptionLevel::Medium
        } else {
            CorruptionLevel::High
        }
    }
}

impl std::fmt::Display for CorruptionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CorruptionLevel::Low => "BAJO",
            CorruptionLevel::Medium => "MEDIO",
            CorruptionLevel::High => "ALTO",
        };
        write!(f, "{label}")
    }
}

/// Result of one resolution pass over a root calculation.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationOutcome {
    pub value: f64,
    pub is_valid: bool,
    pub error: Option<ErrorKind>,
    /// Set for corruption-index passes only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<CorruptionLevel>,
    /// Every calculation id resolved during the pass and its value.
    pub results_map: HashMap<String, f64>,
}

impl EvaluationOutcome {
    pub fn valid(value: f64, results_map: HashMap<String, f64>) -> Self {
        Self {
            value,
            is_valid: true,
            error: None,
            level: None,
            results_map,
        }
    }

    /// Failed passes render a zero value with a diagnostic flag.
    pub fn failed(error: ErrorKind, results_map: HashMap<String, f64>) -> Self {
        Self {
            value: 0.0,
            is_valid: false,
            error: Some(error),
            level: None,
            results_map,
        }
    }
}

/// One row of an enabled-calculations report.
#[derive(Debug, Clone, Serialize)]
pub struct CalculationSummary {
    pub id: String,
    pub abbreviation: String,
    pub name: String,
    pub display_form: DisplayForm,
    pub value: f64,
    pub is_valid: bool,
    pub error: Option<ErrorKind>,
}

/// Outcome of a syntax-only formula check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub error: Option<ErrorKind>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    pub fn invalid(error: ErrorKind) -> Self {
        Self {
            is_valid: false,
            error: Some(error),
        }
    }
}
