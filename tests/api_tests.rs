//! API surface tests: configuration, state wiring, and response envelopes.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use tower::ServiceExt;

use karewa_engine::api::handlers::{ApiResponse, EvaluateRequest, ScopeParams};
use karewa_engine::api::{build_router, ApiConfig, AppState};
use karewa_engine::parser::Dataset;
use karewa_engine::types::{AdministrationPeriod, Organization};

fn dataset() -> Dataset {
    Dataset {
        organizations: vec![Organization {
            id: "inaip".to_string(),
            name: "Instituto de Acceso a la Informacion".to_string(),
            short_name: "INAIP".to_string(),
            administration_period: AdministrationPeriod {
                start: NaiveDate::from_ymd_opt(2021, 10, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 9, 30).unwrap(),
            },
        }],
        contracts: vec![],
        calculations: vec![],
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CONFIG TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_config_default() {
    let config = ApiConfig::default();
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 8080);
}

#[test]
fn test_config_custom() {
    let config = ApiConfig {
        host: "0.0.0.0".to_string(),
        port: 3000,
    };
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 3000);
}

// ═══════════════════════════════════════════════════════════════════════════
// APP STATE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_app_state_from_dataset() {
    let state = AppState::from_dataset(dataset());
    assert_eq!(state.version, env!("CARGO_PKG_VERSION"));
    assert!(state.store.organization("inaip").is_some());
    assert!(state.store.organization("nobody").is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// ROUTER TESTS
// ═══════════════════════════════════════════════════════════════════════════

async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
    let router = build_router(Arc::new(AppState::from_dataset(dataset())));
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_route() {
    let (status, json) = get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["status"], "healthy");
}

#[tokio::test]
async fn test_organizations_route() {
    let (status, json) = get("/api/v1/organizations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["id"], "inaip");
}

#[tokio::test]
async fn test_index_route_rejects_unknown_organization() {
    let (status, json) = get("/api/v1/index?organization=ghost").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("unknown organization"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (status, _) = get("/api/v1/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ═══════════════════════════════════════════════════════════════════════════
// API RESPONSE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_api_response_ok() {
    let response: ApiResponse<String> = ApiResponse::ok("test".to_string());
    assert!(response.success);
    assert_eq!(response.data, Some("test".to_string()));
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
fn test_api_response_skips_empty_fields() {
    let response: ApiResponse<String> = ApiResponse::err("boom");
    let json = serde_json::to_value(&response).unwrap();
    assert!(json.get("data").is_none());
    assert_eq!(json["error"], "boom");

    let response: ApiResponse<u32> = ApiResponse::ok(7);
    let json = serde_json::to_value(&response).unwrap();
    assert!(json.get("error").is_none());
    assert_eq!(json["data"], 7);
}

#[test]
fn test_api_response_request_ids_are_unique() {
    let a: ApiResponse<u32> = ApiResponse::ok(1);
    let b: ApiResponse<u32> = ApiResponse::ok(1);
    assert_ne!(a.request_id, b.request_id);
}

// ═══════════════════════════════════════════════════════════════════════════
// REQUEST DESERIALIZATION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_scope_params_parse_dates() {
    let params: ScopeParams =
        serde_json::from_str(r#"{"organization":"inaip","from":"2022-01-01"}"#).unwrap();
    assert_eq!(params.organization, "inaip");
    assert_eq!(params.from, NaiveDate::from_ymd_opt(2022, 1, 1));
    assert!(params.to.is_none());
}

#[test]
fn test_evaluate_request_minimal() {
    let request: EvaluateRequest =
        serde_json::from_str(r#"{"organization":"inaip","abbreviation":"ICC"}"#).unwrap();
    assert_eq!(request.organization, "inaip");
    assert_eq!(request.abbreviation, "ICC");
    assert!(request.from.is_none());
    assert!(request.to.is_none());
}
