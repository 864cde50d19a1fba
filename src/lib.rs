//! # Karewa Engine
//!
//! A transparency scoring engine for public procurement data. Organizations
//! publish their contracts, analysts describe scoring rules as arithmetic
//! formulas over contract aggregates, and the engine resolves the whole
//! dependency graph into a single corruption index.
//!
//! ## Features
//!
//! - **Formula evaluation**: arithmetic expressions over `$VARIABLE` tokens
//!   (filtered contract aggregates) and `$ABBREVIATION` tokens (nested
//!   calculations)
//! - **Dependency resolution**: memoized depth-first resolution with cycle
//!   and depth protection, plus `petgraph` topological ordering for reports
//! - **Scale mapping**: raw aggregates mapped onto scoring bands before they
//!   enter a formula
//! - **YAML datasets**: organizations, contracts and calculations loaded and
//!   cross-validated from a single file
//! - **HTTP API**: an `axum` server exposing the index, the calculation
//!   catalog and ad-hoc evaluation
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use karewa_engine::core::{CalculationRef, Orchestrator};
//! use karewa_engine::parser::parse_dataset;
//! use karewa_engine::types::QueryContext;
//!
//! # async fn run() -> karewa_engine::KarewaResult<()> {
//! let dataset = parse_dataset("transparency.yaml")?;
//! let store = Arc::new(dataset.into_store());
//! let orchestrator = Orchestrator::new(store.clone(), store.clone());
//!
//! let org = store.organization("inaip").expect("organization");
//! let query = QueryContext::for_organization(org, None, None);
//! let index = orchestrator.corruption_index(&query).await?;
//! println!("corruption index: {}", index.value);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cli;
pub mod core;
pub mod error;
pub mod parser;
pub mod store;
pub mod types;

pub use crate::core::{CalculationRef, Orchestrator};
pub use error::{ErrorKind, KarewaError, KarewaResult};
pub use parser::{parse_dataset, Dataset};
pub use store::{CalculationStore, ContractStore, InMemoryStore};
pub use types::{
    Calculation, CalculationSummary, Contract, CorruptionLevel, EvaluationOutcome, Organization,
    QueryContext, ValidationOutcome,
};
