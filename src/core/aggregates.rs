//! Aggregate Data Provider: turns one raw variable of a calculation into a
//! scalar by running its filter against the contract store, then applying the
//! calculation's percentage scale.

use std::sync::Arc;

use crate::error::KarewaResult;
use crate::store::ContractStore;
use crate::types::{Calculation, QueryContext};

/// A resolved raw-variable value, or the "missing" sentinel when the filter
/// is absent or malformed. The caller decides whether missing invalidates
/// the whole expression (evaluation) or substitutes a neutral 1 (validation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariableValue {
    Value(f64),
    Missing,
}

pub struct AggregateProvider {
    contracts: Arc<dyn ContractStore>,
}

impl AggregateProvider {
    pub fn new(contracts: Arc<dyn ContractStore>) -> Self {
        Self { contracts }
    }

    /// Resolve one `$ABBR` variable of a calculation.
    ///
    /// Missing or malformed filters resolve to `Missing` rather than
    /// erroring; only store faults propagate as `Err`.
    pub async fn variable_value(
        &self,
        calculation: &Calculation,
        abbreviation: &str,
        query: &QueryContext,
    ) -> KarewaResult<VariableValue> {
        let filter = match calculation.filter_for(abbreviation) {
            Some(filter) => filter,
            None => return Ok(VariableValue::Missing),
        };

        if !filter.is_well_formed() {
            tracing::debug!(
                calculation = %calculation.abbreviation,
                variable = %abbreviation,
                "malformed filter, variable resolves to missing"
            );
            return Ok(VariableValue::Missing);
        }

        let raw = self.contracts.aggregate(filter, query).await?;
        Ok(VariableValue::Value(calculation.scale_value(raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::types::{
        AggregateKind, CalculationType, Contract, ContractProperty, DisplayForm, Filter,
        FilterOperator, PropertyType, ScaleBand,
    };
    use chrono::NaiveDate;

    fn calculation_with_filter(filter: Filter) -> Calculation {
        Calculation {
            id: "c1".to_string(),
            organization: "org".to_string(),
            name: "test".to_string(),
            description: String::new(),
            abbreviation: "TST".to_string(),
            calculation_type: CalculationType::Contract,
            display_form: DisplayForm::Amount,
            enabled: true,
            locked: false,
            notes: None,
            formula: None,
            has_percent_scale: false,
            scale: vec![],
            filters: vec![filter],
            deleted: false,
        }
    }

    fn count_filter(variable: &str) -> Filter {
        Filter {
            variable: variable.to_string(),
            property: ContractProperty::TotalAmount,
            property_type: PropertyType::Number,
            operator: FilterOperator::Greater,
            value: Some("0".to_string()),
            reference: None,
            on_model: None,
            aggregate: AggregateKind::Count,
        }
    }

    fn provider_with_contracts(count: usize) -> AggregateProvider {
        let contracts = (0..count)
            .map(|i| Contract {
                organization: "org".to_string(),
                supplier: format!("s{i}"),
                organizer_administrative_unit: None,
                applicant_administrative_unit: None,
                total_amount: 100.0,
                min_amount: None,
                max_amount: None,
                signed_at: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
                deleted: false,
            })
            .collect();
        AggregateProvider::new(Arc::new(InMemoryStore::new(vec![], contracts, vec![])))
    }

    fn query() -> QueryContext {
        QueryContext::new(
            "org",
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_variable_resolves_through_filter() {
        let calc = calculation_with_filter(count_filter("NTC"));
        let provider = provider_with_contracts(4);
        let value = provider
            .variable_value(&calc, "NTC", &query())
            .await
            .unwrap();
        assert_eq!(value, VariableValue::Value(4.0));
    }

    #[tokio::test]
    async fn test_variable_without_filter_is_missing() {
        let calc = calculation_with_filter(count_filter("NTC"));
        let provider = provider_with_contracts(4);
        let value = provider
            .variable_value(&calc, "OTHER", &query())
            .await
            .unwrap();
        assert_eq!(value, VariableValue::Missing);
    }

    #[tokio::test]
    async fn test_malformed_filter_is_missing() {
        let mut filter = count_filter("NTC");
        filter.value = None;
        let calc = calculation_with_filter(filter);
        let provider = provider_with_contracts(4);
        let value = provider
            .variable_value(&calc, "NTC", &query())
            .await
            .unwrap();
        assert_eq!(value, VariableValue::Missing);
    }

    #[tokio::test]
    async fn test_percent_scale_applied_to_raw_value() {
        let mut calc = calculation_with_filter(count_filter("NTC"));
        calc.has_percent_scale = true;
        calc.scale = vec![
            ScaleBand {
                min: 0.0,
                max: 55.0,
                value: 10.0,
            },
            ScaleBand {
                min: 55.0,
                max: 75.0,
                value: 50.0,
            },
        ];
        // 62 matching contracts -> raw 62 falls in the [55, 75) band.
        let provider = provider_with_contracts(62);
        let value = provider
            .variable_value(&calc, "NTC", &query())
            .await
            .unwrap();
        assert_eq!(value, VariableValue::Value(50.0));
    }
}
