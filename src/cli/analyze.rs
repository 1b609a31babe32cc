//! Analyze command implementation
//!
//! Reads a wholesale product CSV, runs the batch pipeline against the three
//! external sources, and exports one report row per product.

use crate::checkpoint::JsonCheckpointStore;
use crate::fetch::FetcherSet;
use crate::identifier::ProductIdentifier;
use crate::output::{CsvReportWriter, OutputWriter, ReportWriter};
use crate::profit::ProfitOptions;
use crate::scheduler::{
    Batch, BatchScheduler, BatchStatus, BatchSummary, PipelineConfig, SourceTuning,
};
use crate::shutdown::SharedCancel;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::sources::SourcesCommand;
use super::validate::ValidateCommand;
use super::CliError;

/// Maximum allowed fan-out to prevent self-inflicted rate limiting
const MAX_FAN_OUT: usize = 32;

/// Parse and validate a fan-out width value
fn parse_fan_out(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("fan-out must be at least 1".to_string());
    }
    if value > MAX_FAN_OUT {
        return Err(format!("fan-out {value} exceeds maximum of {MAX_FAN_OUT}"));
    }
    Ok(value)
}

/// Wholesale Profit Analyzer CLI
#[derive(Parser, Debug)]
#[command(name = "wholesale-profit-analyzer")]
#[command(about = "Analyze resale profitability of wholesale product batches", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Checkpoint state directory
    #[arg(long, global = true, default_value = ".checkpoints")]
    pub checkpoint_dir: PathBuf,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a batch of products from a CSV input file
    Analyze(AnalyzeCommand),
    /// List the external sources and their tuning
    Sources(SourcesCommand),
    /// Validate JAN codes, input files, or checkpoint state
    Validate(ValidateCommand),
}

/// One row of the input CSV
#[derive(Debug, Deserialize)]
struct InputRow {
    jan_code: String,
    wholesale_price: Decimal,
    source_listing_url: String,
}

/// Analyze subcommand
#[derive(Parser, Debug)]
pub struct AnalyzeCommand {
    /// Input CSV with columns: jan_code, wholesale_price, source_listing_url
    pub input: PathBuf,

    /// Output report CSV path
    #[arg(short, long, default_value = "report.csv")]
    pub output: PathBuf,

    /// Batch id used as the checkpoint key (default: input file stem)
    #[arg(long)]
    pub batch_id: Option<String>,

    /// Number of products processed concurrently (default: 8, max: 32)
    ///
    /// The per-source rate limiters remain the primary backpressure
    /// mechanism; this only bounds in-flight products.
    #[arg(long, default_value = "8", value_parser = parse_fan_out)]
    pub fan_out: usize,

    /// Per-product deadline in seconds for the dependent parallel fetches
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub per_product_timeout_secs: u64,

    /// Split the input into sub-batches of at most this many products
    #[arg(long)]
    pub max_batch_size: Option<usize>,

    /// Divide estimated monthly sales by (competitor count + 1)
    #[arg(long, default_value_t = false)]
    pub damp_by_competitor_count: bool,

    /// Catalog API credential
    #[arg(long, env = "CATALOG_API_KEY", hide_env_values = true)]
    pub catalog_api_key: Option<String>,

    /// Price history API credential
    #[arg(long, env = "PRICE_HISTORY_API_KEY", hide_env_values = true)]
    pub price_history_api_key: Option<String>,

    /// Competitor marketplace API credential
    #[arg(long, env = "COMPETITOR_API_KEY", hide_env_values = true)]
    pub competitor_api_key: Option<String>,

    /// Bind a Prometheus scrape endpoint on this address (e.g., 0.0.0.0:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl AnalyzeCommand {
    /// Execute the analyze command.
    pub async fn execute(&self, cli: &Cli, cancel: SharedCancel) -> Result<(), CliError> {
        let products = read_input_products(&self.input)?;
        let batch_id = self.resolve_batch_id()?;

        if let Some(addr) = self.metrics_addr {
            crate::metrics::init_metrics(addr)
                .await
                .map_err(|e| CliError::InvalidArgument(format!("metrics: {e}")))?;
        }

        let config = self.build_config();
        let store = Arc::new(JsonCheckpointStore::new(&cli.checkpoint_dir));
        let fetchers = FetcherSet::from_config(&config);
        let scheduler = BatchScheduler::new(fetchers, store, config)
            .with_profit_options(ProfitOptions {
                damp_by_competitor_count: self.damp_by_competitor_count,
            })
            .with_cancel(cancel);

        let batches = match self.max_batch_size {
            Some(max) => Batch::split(&batch_id, products, max),
            None => vec![Batch::ingest(&batch_id, products)],
        };

        let mut writer = CsvReportWriter::new(&self.output)?;
        let mut totals = BatchSummary::default();
        let mut cancelled = false;

        for batch in batches {
            let outcome = scheduler.run_batch(&batch.batch_id, batch.products).await?;
            writer.write_rows(&outcome.rows)?;
            writer.flush()?;

            totals.total_products += outcome.summary.total_products;
            totals.matched += outcome.summary.matched;
            totals.unmatched += outcome.summary.unmatched;
            totals.partial += outcome.summary.partial;
            totals.resumed += outcome.summary.resumed;
            totals.duplicates_dropped += outcome.summary.duplicates_dropped;

            if outcome.status == BatchStatus::Cancelled {
                cancelled = true;
                break;
            }
        }
        writer.close()?;

        info!(
            output = %self.output.display(),
            total = totals.total_products,
            matched = totals.matched,
            unmatched = totals.unmatched,
            partial = totals.partial,
            resumed = totals.resumed,
            "Analysis finished"
        );
        println!(
            "Report written to {}: {} matched, {} unmatched, {} partial ({} resumed)",
            self.output.display(),
            totals.matched,
            totals.unmatched,
            totals.partial,
            totals.resumed
        );
        if cancelled {
            println!("Run was cancelled; re-run with the same batch id to resume.");
        }

        Ok(())
    }

    fn resolve_batch_id(&self) -> Result<String, CliError> {
        if let Some(id) = &self.batch_id {
            return Ok(id.clone());
        }
        self.input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(|stem| stem.to_string())
            .ok_or_else(|| {
                CliError::InvalidArgument(
                    "cannot derive a batch id from the input path; pass --batch-id".to_string(),
                )
            })
    }

    fn build_config(&self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            catalog: SourceTuning {
                api_key: self.catalog_api_key.clone(),
                ..defaults.catalog
            },
            price_history: SourceTuning {
                api_key: self.price_history_api_key.clone(),
                ..defaults.price_history
            },
            competitor_price: SourceTuning {
                api_key: self.competitor_api_key.clone(),
                ..defaults.competitor_price
            },
            per_product_timeout: Duration::from_secs(self.per_product_timeout_secs),
            fan_out_width: self.fan_out,
        }
    }
}

/// Read and validate the input CSV, skipping invalid rows with a warning.
fn read_input_products(path: &Path) -> Result<Vec<ProductIdentifier>, CliError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| CliError::InputError(format!("{}: {e}", path.display())))?;

    let mut products = Vec::new();
    let mut invalid_rows = 0usize;
    for (index, result) in reader.deserialize::<InputRow>().enumerate() {
        let line = index + 2; // header is line 1
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!(line, error = %e, "Skipping malformed input row");
                invalid_rows += 1;
                continue;
            }
        };
        match ProductIdentifier::new(&row.jan_code, row.wholesale_price, row.source_listing_url)
        {
            Ok(product) => products.push(product),
            Err(e) => {
                warn!(line, jan = %row.jan_code, error = %e, "Skipping invalid product");
                invalid_rows += 1;
            }
        }
    }

    if invalid_rows > 0 {
        warn!(invalid_rows, "Input rows skipped during ingest");
    }
    if products.is_empty() {
        return Err(CliError::InputError(format!(
            "{}: no valid products found",
            path.display()
        )));
    }

    info!(
        path = %path.display(),
        products = products.len(),
        invalid_rows,
        "Input file loaded"
    );
    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_fan_out_bounds() {
        assert_eq!(parse_fan_out("8").unwrap(), 8);
        assert!(parse_fan_out("0").is_err());
        assert!(parse_fan_out("33").is_err());
        assert!(parse_fan_out("abc").is_err());
    }

    #[test]
    fn test_read_input_skips_invalid_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("input.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "jan_code,wholesale_price,source_listing_url").unwrap();
        writeln!(file, "4901234567894,1000,https://wholesale.example/a").unwrap();
        writeln!(file, "4901234567890,1000,https://wholesale.example/bad-checksum").unwrap();
        writeln!(file, "49123456,250,https://wholesale.example/b").unwrap();
        drop(file);

        let products = read_input_products(&path).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].jan_code.as_str(), "4901234567894");
    }

    #[test]
    fn test_read_input_all_invalid_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("input.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "jan_code,wholesale_price,source_listing_url").unwrap();
        writeln!(file, "123,1000,https://wholesale.example/a").unwrap();
        drop(file);

        assert!(matches!(
            read_input_products(&path),
            Err(CliError::InputError(_))
        ));
    }
}
