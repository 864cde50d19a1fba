//! Calculation orchestrator: the façade request handlers call.
//!
//! Owns one fresh `ResolutionContext` per entry-point call, drives the
//! resolver, and converts expected domain failures into outcome flags so the
//! HTTP layer can render a zero result with a diagnostic instead of a 500.

use std::fmt;
use std::sync::Arc;

use super::expression::{self, Bindings};
use super::resolver::{resolution_order, ResolutionContext, Resolver};
use crate::error::{ErrorKind, KarewaResult};
use crate::store::{CalculationStore, ContractStore};
use crate::types::{
    Calculation, CalculationSummary, CorruptionLevel, EvaluationOutcome, QueryContext,
    ValidationOutcome,
};

/// How the root calculation of a pass is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalculationRef {
    Id(String),
    Abbreviation(String),
    /// The organization's single locked calculation (corruption index).
    Locked,
}

impl fmt::Display for CalculationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalculationRef::Id(id) => write!(f, "id:{id}"),
            CalculationRef::Abbreviation(abbr) => write!(f, "abbreviation:{abbr}"),
            CalculationRef::Locked => write!(f, "locked"),
        }
    }
}

/// Full report for one organization: the corruption index plus every enabled
/// calculation, all resolved against a single shared context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrganizationReport {
    pub corruption_index: EvaluationOutcome,
    pub calculations: Vec<CalculationSummary>,
}

pub struct Orchestrator {
    calculations: Arc<dyn CalculationStore>,
    resolver: Resolver,
}

impl Orchestrator {
    pub fn new(
        calculations: Arc<dyn CalculationStore>,
        contracts: Arc<dyn ContractStore>,
    ) -> Self {
        let resolver = Resolver::new(calculations.clone(), contracts);
        Self {
            calculations,
            resolver,
        }
    }

    /// Evaluate one root calculation with a fresh resolution context.
    ///
    /// Never reuses a context across calls: the query context (period,
    /// organization) may differ between them.
    pub async fn evaluate(
        &self,
        target: &CalculationRef,
        query: &QueryContext,
    ) -> KarewaResult<EvaluationOutcome> {
        let mut ctx = ResolutionContext::new();
        self.evaluate_with(target, query, &mut ctx).await
    }

    /// The headline transparency score: the locked calculation's value, or a
    /// flagged zero when it is missing or fails.
    pub async fn corruption_index(&self, query: &QueryContext) -> KarewaResult<EvaluationOutcome> {
        self.evaluate(&CalculationRef::Locked, query).await
    }

    /// Evaluate every enabled calculation of the organization, sharing one
    /// resolution context so common dependencies resolve once.
    pub async fn enabled_report(
        &self,
        query: &QueryContext,
    ) -> KarewaResult<Vec<CalculationSummary>> {
        let enabled = self.calculations.list_enabled(&query.organization).await?;
        let mut ctx = ResolutionContext::new();
        self.summaries(&enabled, query, &mut ctx).await
    }

    /// One-call report used by comparison views: index plus enabled
    /// summaries, everything memoized in the same pass.
    pub async fn organization_report(
        &self,
        query: &QueryContext,
    ) -> KarewaResult<OrganizationReport> {
        let enabled = self.calculations.list_enabled(&query.organization).await?;
        let mut ctx = ResolutionContext::new();

        let calculations = self.summaries(&enabled, query, &mut ctx).await?;
        let corruption_index = self
            .evaluate_with(&CalculationRef::Locked, query, &mut ctx)
            .await?;

        Ok(OrganizationReport {
            corruption_index,
            calculations,
        })
    }

    async fn summaries(
        &self,
        enabled: &[Calculation],
        query: &QueryContext,
        ctx: &mut ResolutionContext,
    ) -> KarewaResult<Vec<CalculationSummary>> {
        // Dependency order keeps the walk shallow; a cycle in the declared
        // edges is reported per-node by the resolver, so fall back to the
        // stored order.
        let sorted: Vec<&Calculation> = match resolution_order(enabled) {
            Ok(order) => {
                let position = |c: &Calculation| {
                    order
                        .iter()
                        .position(|abbr| *abbr == c.abbreviation)
                        .unwrap_or(usize::MAX)
                };
                let mut sorted: Vec<&Calculation> = enabled.iter().collect();
                sorted.sort_by_key(|c| position(c));
                sorted
            }
            Err(_) => enabled.iter().collect(),
        };

        let mut summaries = Vec::with_capacity(sorted.len());
        for calc in sorted {
            let (value, is_valid, error) = match self.resolver.resolve(&calc.id, query, ctx).await
            {
                Ok(value) => (value, true, None),
                Err(e) => match e.kind() {
                    Some(kind) => {
                        tracing::warn!(
                            calculation = %calc.abbreviation,
                            error = %kind,
                            "calculation failed during report"
                        );
                        (0.0, false, Some(kind.clone()))
                    }
                    None => return Err(e),
                },
            };
            summaries.push(CalculationSummary {
                id: calc.id.clone(),
                abbreviation: calc.abbreviation.clone(),
                name: calc.name.clone(),
                display_form: calc.display_form,
                value,
                is_valid,
                error,
            });
        }

        Ok(summaries)
    }

    async fn evaluate_with(
        &self,
        target: &CalculationRef,
        query: &QueryContext,
        ctx: &mut ResolutionContext,
    ) -> KarewaResult<EvaluationOutcome> {
        let mut outcome = match self.lookup(target, query).await? {
            None => EvaluationOutcome::failed(
                ErrorKind::CalculationNotFound(target.to_string()),
                ctx.results_map.clone(),
            ),
            Some(calculation) => {
                match self.resolver.resolve(&calculation.id, query, ctx).await {
                    Ok(value) => EvaluationOutcome::valid(value, ctx.results_map.clone()),
                    Err(e) => match e.kind() {
                        Some(kind) => EvaluationOutcome::failed(
                            kind.clone(),
                            ctx.results_map.clone(),
                        ),
                        None => return Err(e),
                    },
                }
            }
        };

        // Index passes carry the qualitative level; a failed index renders
        // zero and classifies as low like any other zero.
        if *target == CalculationRef::Locked {
            outcome.level = Some(CorruptionLevel::classify(outcome.value));
        }

        Ok(outcome)
    }

    async fn lookup(
        &self,
        target: &CalculationRef,
        query: &QueryContext,
    ) -> KarewaResult<Option<Calculation>> {
        match target {
            CalculationRef::Id(id) => {
                self.calculations.find_by_id(&query.organization, id).await
            }
            CalculationRef::Abbreviation(abbr) => {
                self.calculations
                    .find_by_abbreviation(&query.organization, abbr)
                    .await
            }
            CalculationRef::Locked => self.calculations.find_locked(&query.organization).await,
        }
    }
}

/// Stateless syntax check for a calculation's formula.
///
/// Substitutes the neutral literal 1 for every token and evaluates, purely
/// to confirm the expression parses; no store access, no persistence
/// coupling. Non-finite results are fine here: `$X / 0` is syntactically
/// valid even though a real evaluation would flag it.
pub fn validate_formula(calculation: &Calculation) -> ValidationOutcome {
    let Some(formula) = &calculation.formula else {
        return ValidationOutcome::invalid(ErrorKind::MissingFormula);
    };

    let expr = match expression::parse(&formula.expression) {
        Ok(expr) => expr,
        Err(kind) => return ValidationOutcome::invalid(kind),
    };

    match expression::evaluate(&expr, &Bindings::validation()) {
        Ok(_) => ValidationOutcome::valid(),
        Err(kind) => ValidationOutcome::invalid(kind),
    }
}
