//! CLI command for listing the configured external sources

use crate::fetch::config::{
    SourceEndpoint, CATALOG_ENDPOINT, PRICE_HISTORY_ENDPOINT, RAKUTEN_ICHIBA_ENDPOINT,
    YAHOO_SHOPPING_ENDPOINT,
};
use crate::fetch::Source;
use crate::scheduler::PipelineConfig;
use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

/// Sources subcommand
#[derive(Debug, Args)]
pub struct SourcesCommand {
    #[command(subcommand)]
    action: SourcesAction,
}

/// Sources actions
#[derive(Debug, clap::Subcommand)]
enum SourcesAction {
    /// List the sources, their endpoints, and default tuning
    List {
        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },
}

/// Output format for the sources command
#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

impl SourcesCommand {
    /// Execute the sources command
    pub async fn execute(&self) -> Result<()> {
        match &self.action {
            SourcesAction::List { format } => self.execute_list(format),
        }
    }

    fn execute_list(&self, format: &OutputFormat) -> Result<()> {
        let defaults = PipelineConfig::default();
        let entries: Vec<(Source, &SourceEndpoint, &crate::scheduler::SourceTuning)> = vec![
            (Source::Catalog, &CATALOG_ENDPOINT, &defaults.catalog),
            (
                Source::PriceHistory,
                &PRICE_HISTORY_ENDPOINT,
                &defaults.price_history,
            ),
            (
                Source::CompetitorPrice,
                &YAHOO_SHOPPING_ENDPOINT,
                &defaults.competitor_price,
            ),
        ];

        let mut results = Vec::new();
        for (source, endpoint, tuning) in &entries {
            results.push(json!({
                "source": source.label(),
                "base_url": endpoint.base_url,
                "search_path": endpoint.search_path,
                "authenticated": endpoint.key_param.is_some(),
                "rate_capacity": tuning.rate_capacity,
                "refill_per_sec": tuning.refill_per_sec,
                "max_attempts": tuning.max_attempts,
            }));
        }
        // The competitor source fans out to a second marketplace behind the
        // same rate limiter; list that endpoint as well.
        results.push(json!({
            "source": Source::CompetitorPrice.label(),
            "base_url": RAKUTEN_ICHIBA_ENDPOINT.base_url,
            "search_path": RAKUTEN_ICHIBA_ENDPOINT.search_path,
            "authenticated": RAKUTEN_ICHIBA_ENDPOINT.key_param.is_some(),
            "rate_capacity": defaults.competitor_price.rate_capacity,
            "refill_per_sec": defaults.competitor_price.refill_per_sec,
            "max_attempts": defaults.competitor_price.max_attempts,
        }));

        match format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&results)
                        .context("Failed to serialize results to JSON")?
                );
            }
            OutputFormat::Human => {
                println!("Configured sources:\n");
                for result in results {
                    println!(
                        "{} | {}{} | burst={} | {}/sec | attempts={}",
                        result["source"].as_str().unwrap(),
                        result["base_url"].as_str().unwrap(),
                        result["search_path"].as_str().unwrap(),
                        result["rate_capacity"],
                        result["refill_per_sec"],
                        result["max_attempts"]
                    );
                }
            }
        }

        Ok(())
    }
}
