//! Dataset loading and load-time validation.
//!
//! A dataset is one YAML document holding organizations, contracts, and
//! calculations. Besides deserializing, loading cross-checks the invariants
//! the engine relies on: unique abbreviations per organization, sane scale
//! bands, parseable expressions, and declared dependency edges consistent
//! with the tokens actually present in each expression.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::expression;
use crate::error::{KarewaError, KarewaResult};
use crate::store::InMemoryStore;
use crate::types::{Calculation, Contract, Organization};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub contracts: Vec<Contract>,
    #[serde(default)]
    pub calculations: Vec<Calculation>,
}

impl Dataset {
    pub fn into_store(self) -> InMemoryStore {
        InMemoryStore::new(self.organizations, self.contracts, self.calculations)
    }
}

/// Parse a dataset YAML file and validate it.
pub fn parse_dataset(path: impl AsRef<Path>) -> KarewaResult<Dataset> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let dataset: Dataset = serde_yaml::from_str(&content)?;
    validate_dataset(&dataset)?;
    Ok(dataset)
}

/// Structural checks that make a dataset safe to evaluate against.
///
/// Hard failures: duplicate or malformed abbreviations, inverted scale
/// bands, unknown organizations, expressions that do not parse. Soft drift
/// (declared edges out of step with scanned tokens, missing locked root) is
/// logged and tolerated.
pub fn validate_dataset(dataset: &Dataset) -> KarewaResult<()> {
    let organization_ids: HashSet<&str> =
        dataset.organizations.iter().map(|o| o.id.as_str()).collect();

    // abbreviation -> id per organization, for edge cross-checks below.
    let mut abbreviations: HashMap<(&str, &str), &str> = HashMap::new();

    for calc in dataset.calculations.iter().filter(|c| !c.deleted) {
        if !organization_ids.contains(calc.organization.as_str()) {
            return Err(KarewaError::Validation(format!(
                "calculation '{}' references unknown organization '{}'",
                calc.abbreviation, calc.organization
            )));
        }

        if calc.abbreviation.is_empty()
            || !calc
                .abbreviation
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(KarewaError::Validation(format!(
                "calculation '{}' has an invalid abbreviation '{}' (uppercase alphanumeric only)",
                calc.name, calc.abbreviation
            )));
        }

        let key = (calc.organization.as_str(), calc.abbreviation.as_str());
        if abbreviations.insert(key, calc.id.as_str()).is_some() {
            return Err(KarewaError::Validation(format!(
                "duplicate abbreviation '{}' in organization '{}'",
                calc.abbreviation, calc.organization
            )));
        }

        for band in &calc.scale {
            if band.min >= band.max {
                return Err(KarewaError::Validation(format!(
                    "calculation '{}': scale band min {} must be below max {}",
                    calc.abbreviation, band.min, band.max
                )));
            }
        }

        if let Some(formula) = &calc.formula {
            expression::parse(&formula.expression).map_err(|kind| {
                KarewaError::Parse(format!(
                    "calculation '{}': {}",
                    calc.abbreviation, kind
                ))
            })?;
        }
    }

    for calc in dataset.calculations.iter().filter(|c| !c.deleted) {
        let Some(formula) = &calc.formula else {
            continue;
        };

        // Declared edges must stay consistent with the tokens in the
        // expression; drift is logged, the resolver trusts the tokens.
        let scanned = expression::scan_tokens(&formula.expression);
        let declared: HashSet<&str> = formula.calculations.iter().map(String::as_str).collect();

        for abbr in &scanned.calculations {
            match abbreviations.get(&(calc.organization.as_str(), abbr.as_str())) {
                None => {
                    return Err(KarewaError::Validation(format!(
                        "calculation '{}' references unknown calculation '$${}'",
                        calc.abbreviation, abbr
                    )));
                }
                Some(&dep_id) if !declared.contains(dep_id) => {
                    tracing::warn!(
                        calculation = %calc.abbreviation,
                        dependency = %abbr,
                        "expression references a calculation not declared in formula.calculations"
                    );
                }
                Some(_) => {}
            }
        }

        for abbr in &scanned.variables {
            if calc.filter_for(abbr).is_none() {
                tracing::warn!(
                    calculation = %calc.abbreviation,
                    variable = %abbr,
                    "variable has no filter and will resolve to missing"
                );
            }
        }
    }

    for organization in &dataset.organizations {
        let locked = dataset
            .calculations
            .iter()
            .filter(|c| !c.deleted && c.organization == organization.id && c.locked)
            .count();
        if locked != 1 {
            tracing::warn!(
                organization = %organization.id,
                locked,
                "expected exactly one locked corruption-index calculation"
            );
        }
    }

    Ok(())
}
