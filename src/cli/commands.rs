use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use colored::Colorize;

use crate::api::{run_api_server, ApiConfig, AppState};
use crate::core::{
    dependency_graph, resolution_order, validate_formula, CalculationRef, Orchestrator,
};
use crate::error::{KarewaError, KarewaResult};
use crate::parser::{self, Dataset};
use crate::store::InMemoryStore;
use crate::types::QueryContext;
use std::sync::Arc;

/// Format a number for display, removing unnecessary decimal places
fn format_number(n: f64) -> String {
    let rounded = (n * 1e6).round() / 1e6;
    format!("{:.6}", rounded)
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn load(file: &Path) -> KarewaResult<Dataset> {
    parser::parse_dataset(file)
}

fn engine(dataset: Dataset) -> (Arc<InMemoryStore>, Orchestrator) {
    let store = Arc::new(dataset.into_store());
    let orchestrator = Orchestrator::new(store.clone(), store.clone());
    (store, orchestrator)
}

fn context_for(
    store: &InMemoryStore,
    organization: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> KarewaResult<QueryContext> {
    let org = store.organization(organization).ok_or_else(|| {
        KarewaError::Validation(format!("unknown organization '{organization}'"))
    })?;
    Ok(QueryContext::for_organization(org, from, to))
}

/// Execute the index command: compute the corruption index and show every
/// dependency resolved along the way.
pub async fn index(
    file: PathBuf,
    organization: String,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> KarewaResult<()> {
    println!("{}", "Karewa - Corruption index".bold().green());
    println!("   File: {}", file.display());
    println!("   Organization: {}", organization.bright_yellow());
    println!();

    let (store, orchestrator) = engine(load(&file)?);
    let query = context_for(&store, &organization, from, to)?;
    println!(
        "   Period: {} to {}",
        query.period_start, query.period_end
    );
    println!();

    let outcome = orchestrator.corruption_index(&query).await?;

    if outcome.is_valid {
        println!(
            "{} {}",
            "Corruption index:".bold(),
            format_number(outcome.value).bright_green().bold()
        );
    } else {
        let reason = outcome
            .error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        println!(
            "{} {}  ({})",
            "Corruption index:".bold(),
            "0".yellow().bold(),
            reason.red()
        );
    }

    if let Some(level) = outcome.level {
        println!("{} {}", "Corruption level:".bold(), level.to_string().cyan());
    }

    if !outcome.results_map.is_empty() {
        println!();
        println!("{}", "Resolved dependencies:".bold());
        let mut entries: Vec<_> = outcome.results_map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (id, value) in entries {
            println!("   {} = {}", id.cyan(), format_number(*value));
        }
    }

    Ok(())
}

/// Execute the calculate command: evaluate one calculation by abbreviation.
pub async fn calculate(
    file: PathBuf,
    organization: String,
    abbreviation: String,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> KarewaResult<()> {
    println!("{}", "Karewa - Evaluating calculation".bold().green());
    println!("   File: {}", file.display());
    println!(
        "   Calculation: {} ({})",
        abbreviation.bright_yellow(),
        organization
    );
    println!();

    let (store, orchestrator) = engine(load(&file)?);
    let query = context_for(&store, &organization, from, to)?;

    let target = CalculationRef::Abbreviation(abbreviation.clone());
    let outcome = orchestrator.evaluate(&target, &query).await?;

    if outcome.is_valid {
        println!(
            "{} {}",
            format!("{abbreviation} =").bold(),
            format_number(outcome.value).bright_green().bold()
        );
    } else {
        let reason = outcome
            .error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        println!("{} {}", "Evaluation failed:".red().bold(), reason);
        return Err(KarewaError::Validation(reason));
    }

    Ok(())
}

/// Execute the validate command: syntax-check every formula in each file.
pub fn validate(files: Vec<PathBuf>) -> KarewaResult<()> {
    println!("{}", "Karewa - Validating formulas".bold().green());
    println!();

    let mut failures = 0usize;

    for file in &files {
        println!("   {}", file.display());
        let dataset = load(file)?;

        for calc in dataset.calculations.iter().filter(|c| !c.deleted) {
            let outcome = validate_formula(calc);
            if outcome.is_valid {
                println!("      {} {}", "ok".green(), calc.abbreviation);
            } else {
                failures += 1;
                let reason = outcome
                    .error
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                println!(
                    "      {} {} - {}",
                    "FAIL".red().bold(),
                    calc.abbreviation,
                    reason
                );
            }
        }
    }

    println!();
    if failures == 0 {
        println!("{}", "All formulas are valid".bold().green());
        Ok(())
    } else {
        println!(
            "{}",
            format!("{failures} formula(s) failed validation").bold().red()
        );
        Err(KarewaError::Validation(format!(
            "{failures} formula(s) failed validation"
        )))
    }
}

/// Execute the list command: evaluate every enabled calculation.
pub async fn list(
    file: PathBuf,
    organization: String,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> KarewaResult<()> {
    println!("{}", "Karewa - Enabled calculations".bold().green());
    println!("   File: {}", file.display());
    println!("   Organization: {}", organization.bright_yellow());
    println!();

    let (store, orchestrator) = engine(load(&file)?);
    let query = context_for(&store, &organization, from, to)?;

    let summaries = orchestrator.enabled_report(&query).await?;

    if summaries.is_empty() {
        println!("   {}", "no enabled calculations".yellow());
        return Ok(());
    }

    for summary in &summaries {
        if summary.is_valid {
            println!(
                "   {:10} {:30} {}",
                summary.abbreviation.cyan(),
                summary.name,
                format_number(summary.value).bright_green()
            );
        } else {
            let reason = summary
                .error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            println!(
                "   {:10} {:30} {} ({})",
                summary.abbreviation.cyan(),
                summary.name,
                "invalid".red(),
                reason
            );
        }
    }

    Ok(())
}

/// Execute the graph command: show declared dependency edges and the
/// resolution order.
pub fn graph(file: PathBuf, organization: String) -> KarewaResult<()> {
    println!("{}", "Karewa - Dependency graph".bold().green());
    println!("   File: {}", file.display());
    println!();

    let dataset = load(&file)?;
    let calculations: Vec<_> = dataset
        .calculations
        .into_iter()
        .filter(|c| !c.deleted && c.organization == organization)
        .collect();

    if calculations.is_empty() {
        println!("   {}", "no calculations for this organization".yellow());
        return Ok(());
    }

    let graph = dependency_graph(&calculations);
    println!(
        "   {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    for edge in graph.raw_edges() {
        let from = &graph[edge.source()];
        let to = &graph[edge.target()];
        println!("   {} -> {}", from.cyan(), to.cyan());
    }

    println!();
    match resolution_order(&calculations) {
        Ok(order) => {
            println!("{} {}", "Resolution order:".bold(), order.join(", "));
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "Cycle detected:".red().bold(), e);
            Err(e)
        }
    }
}

/// Execute the serve command: run the HTTP API over one dataset.
pub async fn serve(file: PathBuf, host: String, port: u16) -> KarewaResult<()> {
    let dataset = load(&file)?;
    let state = AppState::from_dataset(dataset);
    let config = ApiConfig { host, port };

    run_api_server(config, state)
        .await
        .map_err(|e| KarewaError::Store(e.to_string()))
}
