//! HTTP API module.
//!
//! Serializes orchestrator outcomes to JSON. Run with `karewa serve` or the
//! `karewa-server` binary.

pub mod handlers;
pub mod server;

pub use server::{build_router, run_api_server, ApiConfig, AppState};
