//! Core formula resolution engine: expression parsing, aggregate variables,
//! dependency resolution with per-pass memoization, and the orchestrator
//! façade.

pub mod aggregates;
pub mod expression;
pub mod orchestrator;
pub mod resolver;

pub use aggregates::{AggregateProvider, VariableValue};
pub use orchestrator::{validate_formula, CalculationRef, Orchestrator, OrganizationReport};
pub use resolver::{
    dependency_graph, resolution_order, ResolutionContext, Resolver, MAX_RESOLUTION_DEPTH,
};
