//! # Wholesale Profit Analyzer Library
//!
//! A library for analyzing the resale profitability of wholesale product
//! batches. Each product (identified by its JAN code) is looked up against
//! three independent external data sources — catalog/price/rank lookup,
//! historical price and sales analysis, and competitor price search — and the
//! merged result is fed into a deterministic profit calculation.
//!
//! ## Features
//!
//! - **Parallel Fan-Out**: Bounded concurrent per-product processing with
//!   dependent fetches sequenced by the batch scheduler
//! - **Per-Source Rate Limiting**: Token-bucket admission control per
//!   external API
//! - **Retry with Backoff**: Exponential backoff with jitter for transient
//!   failures; permanent failures fail fast
//! - **Partial-Failure Tolerance**: A failed source degrades the verdict's
//!   confidence instead of aborting the batch
//! - **Resume Capability**: Durable per-product checkpointing so a crashed
//!   batch skips already-resolved products
//!
//! ## Quick Start
//!
//! ```no_run
//! use wholesale_profit_analyzer::identifier::ProductIdentifier;
//! use wholesale_profit_analyzer::scheduler::{BatchScheduler, PipelineConfig};
//! use wholesale_profit_analyzer::checkpoint::JsonCheckpointStore;
//! use wholesale_profit_analyzer::fetch::FetcherSet;
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let products = vec![ProductIdentifier::new(
//!     "4901234567894",
//!     Decimal::from(1000),
//!     "https://wholesale.example/item/1",
//! )?];
//!
//! let config = PipelineConfig::default();
//! let store = Arc::new(JsonCheckpointStore::new("./checkpoints"));
//! let fetchers = FetcherSet::from_config(&config);
//! let scheduler = BatchScheduler::new(fetchers, store, config);
//!
//! let outcome = scheduler.run_batch("batch-001", products).await?;
//! println!("{} rows", outcome.rows.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`identifier`] - JAN code validation and product identity
//! - [`fetch`] - Source fetchers with retry and rate limiting
//! - [`scheduler`] - Batch fan-out orchestration and the per-product state machine
//! - [`merge`] - Per-product accumulation of source results
//! - [`profit`] - Profitability calculation with pluggable fee models
//! - [`checkpoint`] - Durable per-product progress for crash resumption
//! - [`output`] - Report export writers (CSV)

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// CLI command implementations
pub mod cli;

/// Durable per-product progress persistence
pub mod checkpoint;

/// Source fetchers, retry client, and rate-limited HTTP access
pub mod fetch;

/// JAN code validation and product identity
pub mod identifier;

/// Per-product accumulation of asynchronously arriving source results
pub mod merge;

/// Observability metrics
pub mod metrics;

/// Report export writers
pub mod output;

/// Profitability calculation
pub mod profit;

/// Batch orchestration: fan-out, state machine, rate limiting
pub mod scheduler;

/// Batch cancellation coordination shared across modules
pub mod shutdown;

// Re-export commonly used types
pub use identifier::{JanCode, ProductIdentifier};
pub use merge::MergedRecord;
pub use profit::{Confidence, ProfitReport};

/// Catalog lookup result: the marketplace listing matched to a JAN code.
///
/// Optional per product — the catalog source may find no match, in which
/// case the product is reported as unmatched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchedAsin {
    /// Marketplace catalog identifier (e.g., "B01EXAMPLE1")
    pub asin: String,
    /// Listing title
    pub title: String,
    /// Current listing price
    pub current_price: Decimal,
    /// Sales rank within the listing's category (lower is better)
    pub sales_rank: Option<u64>,
}

impl MatchedAsin {
    /// Validate catalog data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.asin.is_empty() {
            return Err("ASIN cannot be empty".to_string());
        }

        if self.current_price <= Decimal::ZERO {
            return Err(format!(
                "Current price must be positive, got {}",
                self.current_price
            ));
        }

        Ok(())
    }
}

/// A single observation in a price history series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PricePoint {
    /// Observation time (Unix timestamp in milliseconds)
    pub timestamp: i64,
    /// Observed price
    pub price: Decimal,
}

/// Historical price and sales analysis for a matched listing.
///
/// Depends on [`MatchedAsin::asin`]; the scheduler sequences this dependency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceHistoryRecord {
    /// Marketplace catalog identifier the series belongs to
    pub asin: String,
    /// Time-ordered price observations
    pub price_series: Vec<PricePoint>,
    /// Estimated units sold per month, derived from rank movement
    pub estimated_monthly_sales: u64,
}

impl PriceHistoryRecord {
    /// Validate price history integrity (series must be time-ordered)
    pub fn validate(&self) -> Result<(), String> {
        if self.asin.is_empty() {
            return Err("ASIN cannot be empty".to_string());
        }

        for window in self.price_series.windows(2) {
            if window[1].timestamp < window[0].timestamp {
                return Err(format!(
                    "Price series must be time-ordered: {} precedes {}",
                    window[1].timestamp, window[0].timestamp
                ));
            }
        }

        if let Some(point) = self.price_series.iter().find(|p| p.price <= Decimal::ZERO) {
            return Err(format!(
                "Price series contains non-positive price {} at {}",
                point.price, point.timestamp
            ));
        }

        Ok(())
    }

    /// Most recent observed price, if any
    pub fn latest_price(&self) -> Option<Decimal> {
        self.price_series.last().map(|p| p.price)
    }
}

/// A competitor marketplace offer for the same product.
///
/// Keyed by ASIN once the catalog match is known, otherwise by JAN code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompetitorQuote {
    /// Marketplace the quote came from (e.g., "yahoo-shopping", "rakuten")
    pub competitor_source: String,
    /// Offer price including shipping where the marketplace reports it
    pub competitor_price: Decimal,
    /// Offer URL
    pub listing_url: String,
}

impl CompetitorQuote {
    /// Validate quote integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.competitor_source.is_empty() {
            return Err("Competitor source cannot be empty".to_string());
        }

        if self.competitor_price <= Decimal::ZERO {
            return Err(format!(
                "Competitor price must be positive, got {}",
                self.competitor_price
            ));
        }

        Ok(())
    }
}

/// Format a millisecond Unix timestamp for human-readable log output.
pub(crate) fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}
