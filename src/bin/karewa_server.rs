//! Standalone HTTP API server for the Karewa engine.
//!
//! Loads a YAML dataset once at startup and serves it read-only.

use std::path::PathBuf;
use std::process;

use clap::Parser;

use karewa_engine::api::{run_api_server, ApiConfig, AppState};
use karewa_engine::parser::parse_dataset;

#[derive(Parser)]
#[command(name = "karewa-server")]
#[command(about = "HTTP API server for the Karewa transparency engine")]
#[command(version)]
struct Args {
    /// YAML dataset file
    file: PathBuf,

    /// Host to bind to
    #[arg(long, env = "KAREWA_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to
    #[arg(long, env = "KAREWA_PORT", default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let dataset = match parse_dataset(&args.file) {
        Ok(dataset) => dataset,
        Err(e) => {
            eprintln!("failed to load {}: {e}", args.file.display());
            process::exit(1);
        }
    };

    let state = AppState::from_dataset(dataset);
    let config = ApiConfig {
        host: args.host,
        port: args.port,
    };

    if let Err(e) = run_api_server(config, state).await {
        eprintln!("server error: {e}");
        process::exit(1);
    }
}
