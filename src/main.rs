use std::path::PathBuf;
use std::process;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;

use karewa_engine::cli::commands;

#[derive(Parser)]
#[command(name = "karewa")]
#[command(about = "Transparency scoring engine for public procurement data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the corruption index for an organization
    Index {
        /// YAML dataset file
        file: PathBuf,

        /// Organization identifier
        #[arg(short, long)]
        organization: String,

        /// Override the period start (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Override the period end (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Evaluate a single calculation by abbreviation
    Calculate {
        /// YAML dataset file
        file: PathBuf,

        /// Organization identifier
        #[arg(short, long)]
        organization: String,

        /// Calculation abbreviation, e.g. ICC
        #[arg(short, long)]
        abbreviation: String,

        /// Override the period start (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Override the period end (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Validate formula syntax in one or more dataset files
    Validate {
        /// YAML dataset files
        files: Vec<PathBuf>,
    },

    /// Evaluate every enabled calculation for an organization
    List {
        /// YAML dataset file
        file: PathBuf,

        /// Organization identifier
        #[arg(short, long)]
        organization: String,

        /// Override the period start (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Override the period end (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Show the calculation dependency graph and resolution order
    Graph {
        /// YAML dataset file
        file: PathBuf,

        /// Organization identifier
        #[arg(short, long)]
        organization: String,
    },

    /// Serve the HTTP API over a dataset
    Serve {
        /// YAML dataset file
        file: PathBuf,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, default_value = "8080")]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Index {
            file,
            organization,
            from,
            to,
        } => commands::index(file, organization, from, to).await,
        Commands::Calculate {
            file,
            organization,
            abbreviation,
            from,
            to,
        } => commands::calculate(file, organization, abbreviation, from, to).await,
        Commands::Validate { files } => commands::validate(files),
        Commands::List {
            file,
            organization,
            from,
            to,
        } => commands::list(file, organization, from, to).await,
        Commands::Graph { file, organization } => commands::graph(file, organization),
        Commands::Serve { file, host, port } => commands::serve(file, host, port).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
