//! Main entry point for the wholesale-profit-analyzer CLI

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use wholesale_profit_analyzer::cli::{Cli, Commands};
use wholesale_profit_analyzer::shutdown::{self, CancelCoordinator};

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // Check if JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wholesale_profit_analyzer=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    // Install global cancel coordinator and Ctrl+C handler
    let cancel = CancelCoordinator::shared();
    shutdown::set_global_cancel(cancel.clone());
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - finishing resolved products and saving progress...");
                cancel.request_cancel();
            }
        }
    });

    let result = match cli.command {
        Commands::Analyze(ref args) => args
            .execute(&cli, cancel.clone())
            .await
            .map_err(|e| anyhow::anyhow!(e)),
        Commands::Sources(ref sources_cmd) => sources_cmd.execute().await,
        Commands::Validate(ref validate_cmd) => validate_cmd
            .execute(&cli.checkpoint_dir)
            .await
            .map_err(|e| anyhow::anyhow!(e)),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
