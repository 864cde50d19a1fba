//! API request handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::server::AppState;
use crate::core::CalculationRef;
use crate::types::{
    AdministrationPeriod, CalculationSummary, EvaluationOutcome, QueryContext,
};

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Root endpoint response
#[derive(Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
}

/// GET / - Root info
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = RootResponse {
        name: "Karewa API Server".to_string(),
        version: state.version.clone(),
        description: "Corruption-index calculations over government contract data".to_string(),
        endpoints: vec![
            EndpointInfo {
                path: "/health".to_string(),
                method: "GET".to_string(),
                description: "Health check endpoint".to_string(),
            },
            EndpointInfo {
                path: "/version".to_string(),
                method: "GET".to_string(),
                description: "Get server version".to_string(),
            },
            EndpointInfo {
                path: "/api/v1/organizations".to_string(),
                method: "GET".to_string(),
                description: "List known organizations".to_string(),
            },
            EndpointInfo {
                path: "/api/v1/index".to_string(),
                method: "GET".to_string(),
                description: "Corruption index plus enabled calculations for an organization"
                    .to_string(),
            },
            EndpointInfo {
                path: "/api/v1/calculations".to_string(),
                method: "GET".to_string(),
                description: "Enabled calculation results for an organization".to_string(),
            },
            EndpointInfo {
                path: "/api/v1/evaluate".to_string(),
                method: "POST".to_string(),
                description: "Evaluate one calculation by abbreviation".to_string(),
            },
        ],
    };
    Json(ApiResponse::ok(response))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /health - Health check
pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
    }))
}

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
    }))
}

#[derive(Serialize)]
pub struct OrganizationInfo {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub administration_period: AdministrationPeriod,
}

/// GET /api/v1/organizations
pub async fn organizations(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let list: Vec<OrganizationInfo> = state
        .store
        .organizations()
        .iter()
        .map(|o| OrganizationInfo {
            id: o.id.clone(),
            name: o.name.clone(),
            short_name: o.short_name.clone(),
            administration_period: o.administration_period,
        })
        .collect();
    Json(ApiResponse::ok(list))
}

/// Query parameters scoping a resolution pass. `from`/`to` default to the
/// organization's administration period.
#[derive(Deserialize)]
pub struct ScopeParams {
    pub organization: String,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

fn query_context(state: &AppState, params: &ScopeParams) -> Result<QueryContext, String> {
    let organization = state
        .store
        .organization(&params.organization)
        .ok_or_else(|| format!("unknown organization '{}'", params.organization))?;
    Ok(QueryContext::for_organization(
        organization,
        params.from,
        params.to,
    ))
}

#[derive(Serialize)]
pub struct IndexResponse {
    pub organization: String,
    pub corruption_index: EvaluationOutcome,
    pub calculations: Vec<CalculationSummary>,
}

/// GET /api/v1/index - the headline report: corruption index plus enabled
/// calculations, one shared resolution pass.
pub async fn corruption_index(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScopeParams>,
) -> impl IntoResponse {
    let query = match query_context(&state, &params) {
        Ok(query) => query,
        Err(message) => return Json(ApiResponse::<IndexResponse>::err(message)),
    };

    match state.orchestrator.organization_report(&query).await {
        Ok(report) => Json(ApiResponse::ok(IndexResponse {
            organization: params.organization,
            corruption_index: report.corruption_index,
            calculations: report.calculations,
        })),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

/// GET /api/v1/calculations - enabled calculation results only.
pub async fn calculations(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScopeParams>,
) -> impl IntoResponse {
    let query = match query_context(&state, &params) {
        Ok(query) => query,
        Err(message) => return Json(ApiResponse::<Vec<CalculationSummary>>::err(message)),
    };

    match state.orchestrator.enabled_report(&query).await {
        Ok(summaries) => Json(ApiResponse::ok(summaries)),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

/// Evaluate request
#[derive(Deserialize)]
pub struct EvaluateRequest {
    pub organization: String,
    pub abbreviation: String,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

/// POST /api/v1/evaluate - evaluate one calculation by abbreviation.
pub async fn evaluate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EvaluateRequest>,
) -> impl IntoResponse {
    let params = ScopeParams {
        organization: req.organization,
        from: req.from,
        to: req.to,
    };
    let query = match query_context(&state, &params) {
        Ok(query) => query,
        Err(message) => return Json(ApiResponse::<EvaluationOutcome>::err(message)),
    };

    let target = CalculationRef::Abbreviation(req.abbreviation);
    match state.orchestrator.evaluate(&target, &query).await {
        Ok(outcome) => Json(ApiResponse::ok(outcome)),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_ok() {
        let response: ApiResponse<String> = ApiResponse::ok("data".to_string());
        assert!(response.success);
        assert_eq!(response.data, Some("data".to_string()));
        assert!(response.error.is_none());
        assert!(!response.request_id.is_empty());
    }

    #[test]
    fn test_api_response_err() {
        let response: ApiResponse<String> = ApiResponse::err("boom");
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.error, Some("boom".to_string()));
    }

    #[test]
    fn test_api_response_serializes_without_null_fields() {
        let response: ApiResponse<String> = ApiResponse::ok("x".to_string());
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["data"], "x");
    }
}
