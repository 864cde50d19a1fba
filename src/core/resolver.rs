//! Dependency resolver with per-pass memoization and cycle detection.
//!
//! Resolution is a depth-first walk: every calculation referenced by the root
//! (directly or through `$$ABBR` tokens) is evaluated at most once per
//! `ResolutionContext`, children strictly before their parents. A calculation
//! re-entered while still in flight is a cycle and fails the pass.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use super::aggregates::{AggregateProvider, VariableValue};
use super::expression::{self, Bindings, Expr};
use crate::error::{ErrorKind, KarewaError, KarewaResult};
use crate::store::{CalculationStore, ContractStore};
use crate::types::{Calculation, QueryContext};

/// Bound on recursion ahead of the cycle check, so degenerate graphs fail
/// fast instead of walking thousands of nodes first.
pub const MAX_RESOLUTION_DEPTH: usize = 32;

/// Per-pass evaluation cache. Created fresh for every top-level request and
/// never shared across unrelated passes.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    /// Calculation id -> computed value (memoization).
    pub results_map: HashMap<String, f64>,
    /// Ids whose evaluation has completed.
    pub done: HashSet<String>,
    /// Ids that failed definitively, so shared failing dependencies are not
    /// re-resolved within the pass.
    pub failures: HashMap<String, ErrorKind>,
    /// In-flight stack for cycle detection.
    in_flight: Vec<String>,
    /// Store lookups performed during the pass (diagnostic).
    pub lookups: usize,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct Resolver {
    calculations: Arc<dyn CalculationStore>,
    aggregates: AggregateProvider,
    max_depth: usize,
}

impl Resolver {
    pub fn new(
        calculations: Arc<dyn CalculationStore>,
        contracts: Arc<dyn ContractStore>,
    ) -> Self {
        Self {
            calculations,
            aggregates: AggregateProvider::new(contracts),
            max_depth: MAX_RESOLUTION_DEPTH,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Resolve one calculation id to its numeric value, memoized in `ctx`.
    ///
    /// Domain failures come back as `KarewaError::Evaluation`; the
    /// orchestrator converts those into outcome flags.
    pub async fn resolve(
        &self,
        id: &str,
        query: &QueryContext,
        ctx: &mut ResolutionContext,
    ) -> KarewaResult<f64> {
        self.resolve_inner(id.to_string(), query, ctx, 0).await
    }

    // Boxed so the async recursion through `$$ABBR` references type-checks.
    fn resolve_inner<'a>(
        &'a self,
        id: String,
        query: &'a QueryContext,
        ctx: &'a mut ResolutionContext,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = KarewaResult<f64>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(&value) = ctx.results_map.get(&id) {
                return Ok(value);
            }

            if let Some(kind) = ctx.failures.get(&id) {
                return Err(kind.clone().into());
            }

            if ctx.in_flight.iter().any(|entry| entry == &id) {
                let start = ctx
                    .in_flight
                    .iter()
                    .position(|entry| entry == &id)
                    .unwrap_or(0);
                let mut path: Vec<&str> =
                    ctx.in_flight[start..].iter().map(String::as_str).collect();
                path.push(&id);
                return Err(ErrorKind::CircularDependency(path.join(" -> ")).into());
            }

            if depth >= self.max_depth {
                return Err(ErrorKind::DepthExceeded.into());
            }

            ctx.lookups += 1;
            let calculation = self
                .calculations
                .find_by_id(&query.organization, &id)
                .await?
                .ok_or_else(|| KarewaError::from(ErrorKind::CalculationNotFound(id.clone())))?;

            tracing::debug!(
                id = %id,
                abbreviation = %calculation.abbreviation,
                depth,
                "resolving calculation"
            );

            ctx.in_flight.push(id.clone());
            let evaluated = self.evaluate_node(&calculation, query, ctx, depth).await;
            ctx.in_flight.pop();

            let value = match evaluated {
                Ok(value) if !value.is_finite() => {
                    ctx.failures.insert(id, ErrorKind::NonFiniteResult);
                    return Err(ErrorKind::NonFiniteResult.into());
                }
                Ok(value) => value,
                Err(e) => {
                    // Depth failures depend on where the walk entered;
                    // every other domain failure is definitive for the
                    // rest of the pass.
                    if let Some(kind) = e.kind() {
                        if *kind != ErrorKind::DepthExceeded {
                            ctx.failures.insert(id, kind.clone());
                        }
                    }
                    return Err(e);
                }
            };

            ctx.results_map.insert(id.clone(), value);
            ctx.done.insert(id);
            Ok(value)
        })
    }

    /// Evaluate one node: resolve its raw variables through the aggregate
    /// provider and its nested references recursively, then bind and
    /// evaluate the expression. Children fully resolve (or definitively
    /// fail) before the parent's expression runs.
    async fn evaluate_node(
        &self,
        calculation: &Calculation,
        query: &QueryContext,
        ctx: &mut ResolutionContext,
        depth: usize,
    ) -> KarewaResult<f64> {
        let formula = calculation
            .formula
            .as_ref()
            .ok_or(ErrorKind::MissingFormula)?;
        let expr: Expr = expression::parse(&formula.expression).map_err(KarewaError::from)?;

        let mut bindings = Bindings::evaluation();

        for abbreviation in expr.variables() {
            match self
                .aggregates
                .variable_value(calculation, &abbreviation, query)
                .await?
            {
                VariableValue::Value(value) => bindings.bind_variable(abbreviation, value),
                VariableValue::Missing => {
                    return Err(ErrorKind::MissingVariable(abbreviation).into());
                }
            }
        }

        for abbreviation in expr.calculation_refs() {
            let dependency = self
                .calculations
                .find_by_abbreviation(&query.organization, &abbreviation)
                .await?
                .ok_or_else(|| {
                    KarewaError::from(ErrorKind::CalculationNotFound(format!(
                        "$${abbreviation}"
                    )))
                })?;
            let value = self
                .resolve_inner(dependency.id.clone(), query, &mut *ctx, depth + 1)
                .await?;
            bindings.bind_calculation(abbreviation, value);
        }

        expression::evaluate(&expr, &bindings).map_err(KarewaError::from)
    }
}

/// Dependency graph over declared formula edges, nodes labeled by
/// abbreviation, edges pointing from dependency to dependent.
pub fn dependency_graph(calculations: &[Calculation]) -> DiGraph<String, ()> {
    let mut graph = DiGraph::new();
    let mut node_indices = HashMap::new();

    for calc in calculations {
        let idx = graph.add_node(calc.abbreviation.clone());
        node_indices.insert(calc.id.as_str(), idx);
    }

    for calc in calculations {
        if let Some(formula) = &calc.formula {
            for dep_id in &formula.calculations {
                if let (Some(&from), Some(&to)) = (
                    node_indices.get(dep_id.as_str()),
                    node_indices.get(calc.id.as_str()),
                ) {
                    graph.add_edge(from, to, ());
                }
            }
        }
    }

    graph
}

/// Abbreviations in dependency order (dependencies first). A cycle in the
/// declared edges is a `CircularDependency` naming the offending node.
pub fn resolution_order(calculations: &[Calculation]) -> KarewaResult<Vec<String>> {
    let graph = dependency_graph(calculations);
    let order = toposort(&graph, None).map_err(|cycle| {
        let node = graph
            .node_weight(cycle.node_id())
            .cloned()
            .unwrap_or_default();
        KarewaError::from(ErrorKind::CircularDependency(node))
    })?;

    Ok(order
        .into_iter()
        .filter_map(|idx| graph.node_weight(idx).cloned())
        .collect())
}
