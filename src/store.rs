//! Persistence collaborator boundary.
//!
//! The engine only ever reads: calculations by id / abbreviation / locked
//! flag, and filtered contract aggregates. `InMemoryStore` backs both traits
//! with a parsed dataset; a production deployment would implement them over
//! the real contract store.

use async_trait::async_trait;

use crate::error::KarewaResult;
use crate::types::{
    AggregateKind, Calculation, Contract, Filter, Organization, PropertyType, QueryContext,
};

/// Read-only access to calculation entities.
#[async_trait]
pub trait CalculationStore: Send + Sync {
    async fn find_by_id(
        &self,
        organization: &str,
        id: &str,
    ) -> KarewaResult<Option<Calculation>>;

    async fn find_by_abbreviation(
        &self,
        organization: &str,
        abbreviation: &str,
    ) -> KarewaResult<Option<Calculation>>;

    /// The corruption-index root: the single locked calculation of an
    /// organization, looked up by query rather than fixed id.
    async fn find_locked(&self, organization: &str) -> KarewaResult<Option<Calculation>>;

    /// Enabled, non-deleted calculations used for reporting sets.
    async fn list_enabled(&self, organization: &str) -> KarewaResult<Vec<Calculation>>;
}

/// Read-only filtered aggregates over the contract dataset.
#[async_trait]
pub trait ContractStore: Send + Sync {
    /// Run one filter over the non-deleted contracts of the query's
    /// organization and period. Empty result sets are 0, not an error.
    /// Callers hand in well-formed filters only.
    async fn aggregate(&self, filter: &Filter, query: &QueryContext) -> KarewaResult<f64>;
}

/// Dataset-backed store used by the CLI, the API server, and tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    organizations: Vec<Organization>,
    contracts: Vec<Contract>,
    calculations: Vec<Calculation>,
}

impl InMemoryStore {
    pub fn new(
        organizations: Vec<Organization>,
        contracts: Vec<Contract>,
        calculations: Vec<Calculation>,
    ) -> Self {
        Self {
            organizations,
            contracts,
            calculations,
        }
    }

    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    pub fn organization(&self, id: &str) -> Option<&Organization> {
        self.organizations.iter().find(|o| o.id == id)
    }

    fn live_calculations<'a>(
        &'a self,
        organization: &'a str,
    ) -> impl Iterator<Item = &'a Calculation> {
        self.calculations
            .iter()
            .filter(move |c| c.organization == organization && !c.deleted)
    }

    /// Whether a contract matches one filter's predicate.
    fn matches(contract: &Contract, filter: &Filter) -> bool {
        match filter.property_type {
            PropertyType::Number => {
                let target: f64 = match filter.value.as_deref().and_then(|v| v.parse().ok()) {
                    Some(t) => t,
                    None => return false,
                };
                match contract.amount(filter.property) {
                    Some(actual) => filter.operator.compare(&actual, &target),
                    None => false,
                }
            }
            PropertyType::String => match (contract.reference(filter.property), &filter.value) {
                (Some(actual), Some(target)) => {
                    filter.operator.compare(&actual, &target.as_str())
                }
                _ => false,
            },
            PropertyType::Ref => {
                match (contract.reference(filter.property), &filter.reference) {
                    (Some(actual), Some(target)) => {
                        filter.operator.compare(&actual, &target.as_str())
                    }
                    _ => false,
                }
            }
        }
    }
}

#[async_trait]
impl CalculationStore for InMemoryStore {
    async fn find_by_id(
        &self,
        organization: &str,
        id: &str,
    ) -> KarewaResult<Option<Calculation>> {
        Ok(self
            .live_calculations(organization)
            .find(|c| c.id == id)
            .cloned())
    }

    async fn find_by_abbreviation(
        &self,
        organization: &str,
        abbreviation: &str,
    ) -> KarewaResult<Option<Calculation>> {
        Ok(self
            .live_calculations(organization)
            .find(|c| c.abbreviation == abbreviation)
            .cloned())
    }

    async fn find_locked(&self, organization: &str) -> KarewaResult<Option<Calculation>> {
        Ok(self
            .live_calculations(organization)
            .find(|c| c.locked)
            .cloned())
    }

    async fn list_enabled(&self, organization: &str) -> KarewaResult<Vec<Calculation>> {
        Ok(self
            .live_calculations(organization)
            .filter(|c| c.enabled)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ContractStore for InMemoryStore {
    async fn aggregate(&self, filter: &Filter, query: &QueryContext) -> KarewaResult<f64> {
        let matching = self
            .contracts
            .iter()
            .filter(|c| {
                c.organization == query.organization && !c.deleted && query.covers(c.signed_at)
            })
            .filter(|c| Self::matches(c, filter));

        let result = match filter.aggregate {
            AggregateKind::Count => matching.count() as f64,
            AggregateKind::Sum => matching
                .map(|c| {
                    if filter.property.is_numeric() {
                        c.amount(filter.property).unwrap_or(0.0)
                    } else {
                        // Summing over a reference filter totals the
                        // contract amounts of the matches.
                        c.total_amount
                    }
                })
                .sum(),
        };

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContractProperty, FilterOperator};
    use chrono::NaiveDate;

    fn contract(supplier: &str, total: f64, year: i32) -> Contract {
        Contract {
            organization: "org".to_string(),
            supplier: supplier.to_string(),
            organizer_administrative_unit: None,
            applicant_administrative_unit: None,
            total_amount: total,
            min_amount: None,
            max_amount: None,
            signed_at: NaiveDate::from_ymd_opt(year, 6, 15).unwrap(),
            deleted: false,
        }
    }

    fn store() -> InMemoryStore {
        InMemoryStore::new(
            vec![],
            vec![
                contract("s1", 100.0, 2022),
                contract("s1", 300.0, 2022),
                contract("s2", 50.0, 2022),
                contract("s2", 999.0, 2019), // outside the period
                {
                    let mut c = contract("s3", 1000.0, 2022);
                    c.deleted = true;
                    c
                },
            ],
            vec![],
        )
    }

    fn query() -> QueryContext {
        QueryContext::new(
            "org",
            NaiveDate::from_ymd_opt(2021, 10, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 9, 30).unwrap(),
        )
    }

    fn number_filter(operator: FilterOperator, value: &str, aggregate: AggregateKind) -> Filter {
        Filter {
            variable: "X".to_string(),
            property: ContractProperty::TotalAmount,
            property_type: PropertyType::Number,
            operator,
            value: Some(value.to_string()),
            reference: None,
            on_model: None,
            aggregate,
        }
    }

    #[tokio::test]
    async fn test_count_excludes_deleted_and_out_of_period() {
        let filter = number_filter(FilterOperator::Greater, "0", AggregateKind::Count);
        let result = store().aggregate(&filter, &query()).await.unwrap();
        assert_eq!(result, 3.0);
    }

    #[tokio::test]
    async fn test_sum_of_filtered_amounts() {
        let filter = number_filter(FilterOperator::GreaterEqual, "100", AggregateKind::Sum);
        let result = store().aggregate(&filter, &query()).await.unwrap();
        assert_eq!(result, 400.0);
    }

    #[tokio::test]
    async fn test_ref_filter_counts_by_supplier() {
        let filter = Filter {
            variable: "NCSF".to_string(),
            property: ContractProperty::Supplier,
            property_type: PropertyType::Ref,
            operator: FilterOperator::Equal,
            value: None,
            reference: Some("s1".to_string()),
            on_model: Some("Supplier".to_string()),
            aggregate: AggregateKind::Count,
        };
        let result = store().aggregate(&filter, &query()).await.unwrap();
        assert_eq!(result, 2.0);
    }

    #[tokio::test]
    async fn test_empty_result_set_is_zero() {
        let filter = number_filter(FilterOperator::Greater, "100000", AggregateKind::Sum);
        let result = store().aggregate(&filter, &query()).await.unwrap();
        assert_eq!(result, 0.0);
    }

    #[tokio::test]
    async fn test_find_locked_skips_deleted() {
        let mut locked = Calculation {
            id: "c1".to_string(),
            organization: "org".to_string(),
            name: "index".to_string(),
            description: String::new(),
            abbreviation: "ICC".to_string(),
            calculation_type: crate::types::CalculationType::General,
            display_form: crate::types::DisplayForm::Normal,
            enabled: true,
            locked: true,
            notes: None,
            formula: None,
            has_percent_scale: false,
            scale: vec![],
            filters: vec![],
            deleted: true,
        };
        let store = InMemoryStore::new(vec![], vec![], vec![locked.clone()]);
        assert!(store.find_locked("org").await.unwrap().is_none());

        locked.deleted = false;
        let store = InMemoryStore::new(vec![], vec![], vec![locked]);
        assert_eq!(
            store.find_locked("org").await.unwrap().unwrap().id,
            "c1"
        );
    }
}
