//! HTTP API server.
//!
//! Thin collaborator boundary over the orchestrator: routes deserialize a
//! query context, invoke an entry point, and serialize the outcome to JSON.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers;
use crate::core::Orchestrator;
use crate::parser::Dataset;
use crate::store::InMemoryStore;

/// API server configuration
#[derive(Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<InMemoryStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub version: String,
}

impl AppState {
    pub fn from_dataset(dataset: Dataset) -> Self {
        let store = Arc::new(dataset.into_store());
        let orchestrator = Arc::new(Orchestrator::new(store.clone(), store.clone()));
        Self {
            store,
            orchestrator,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Build the router; split out so tests can drive it without a socket.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        .route("/api/v1/organizations", get(handlers::organizations))
        .route("/api/v1/index", get(handlers::corruption_index))
        .route("/api/v1/calculations", get(handlers::calculations))
        .route("/api/v1/evaluate", post(handlers::evaluate))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server until shutdown.
pub async fn run_api_server(config: ApiConfig, state: AppState) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "karewa_engine=info,tower_http=info".into()),
        )
        .init();

    let app = build_router(Arc::new(state));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Karewa API server starting on http://{}", addr);
    info!("   Endpoints: /api/v1/organizations, /api/v1/index, /api/v1/calculations, /api/v1/evaluate");
    info!("   Health: /health, Version: /version");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Karewa API server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server...");
}
