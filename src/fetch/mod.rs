//! Source fetcher implementations
//!
//! The three external data sources — catalog lookup, price history, and
//! competitor price search — share one capability interface:
//! [`SourceFetcher::fetch`] takes a [`FetchRequest`] and returns a
//! [`SourceResult`]. Implementations are distinguished by [`Source`] name,
//! not by behavior; each owns its mapping from the raw API response to the
//! relevant payload type and is otherwise stateless.

use crate::identifier::ProductIdentifier;
use crate::{CompetitorQuote, MatchedAsin, PriceHistoryRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod catalog;
pub mod competitor;
pub mod config;
pub mod http;
pub mod parser;
pub mod price_history;
pub mod retry;

pub use http::SourceHttpClient;
pub use retry::RetryPolicy;

/// One external data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Catalog/price/rank lookup (JAN → ASIN match)
    Catalog,
    /// Historical price and sales analysis (by ASIN)
    PriceHistory,
    /// Competitor price search (by JAN, or ASIN once known)
    CompetitorPrice,
}

impl Source {
    /// All sources attempted per product, in dependency order.
    pub const ALL: [Source; 3] = [
        Source::Catalog,
        Source::PriceHistory,
        Source::CompetitorPrice,
    ];

    /// Stable lowercase label used in logs, metrics, and report columns.
    pub fn label(&self) -> &'static str {
        match self {
            Source::Catalog => "catalog",
            Source::PriceHistory => "price_history",
            Source::CompetitorPrice => "competitor_price",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Failure kinds captured per source into the merged record.
///
/// Serializable so source errors survive in checkpoint state and report rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// Rate limiter deadline elapsed before a token became available
    #[error("rate limit timeout")]
    RateLimitTimeout,

    /// Transient failures persisted through all retry attempts
    #[error("retries exhausted")]
    RetriesExhausted,

    /// Non-retryable failure (4xx other than 429, malformed response)
    #[error("permanent fetch error")]
    PermanentFetchError,

    /// Per-product deadline elapsed while the branch was still in flight
    #[error("timeout")]
    Timeout,
}

/// Outcome of one source fetch attempt for one product.
///
/// `NotFound` means the source responded but has no data — that is not an
/// error and is recorded distinctly from failure kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceResult {
    /// Source produced data
    Success(SourcePayload),
    /// Source responded with no data for this product
    NotFound,
    /// Fetch failed with the given kind
    Error(FetchErrorKind),
}

/// Payload variants, one per source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePayload {
    /// Catalog match
    Catalog(MatchedAsin),
    /// Price history analysis
    PriceHistory(PriceHistoryRecord),
    /// Competitor quotes (possibly from several marketplaces)
    Competitor(Vec<CompetitorQuote>),
}

/// Request passed to every fetcher.
///
/// The catalog fetcher keys on the JAN code; dependent fetchers use the ASIN
/// resolved by the catalog fetch. The scheduler guarantees `asin` is present
/// before a dependent fetcher runs.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Product identity
    pub product: ProductIdentifier,
    /// ASIN resolved by the catalog fetch, if any
    pub asin: Option<String>,
}

impl FetchRequest {
    /// Request for the initial catalog fetch.
    pub fn for_catalog(product: &ProductIdentifier) -> Self {
        Self {
            product: product.clone(),
            asin: None,
        }
    }

    /// Request for a dependent fetch once the ASIN is known.
    pub fn with_asin(product: &ProductIdentifier, asin: &str) -> Self {
        Self {
            product: product.clone(),
            asin: Some(asin.to_string()),
        }
    }
}

/// Common capability interface for the three source fetchers.
///
/// Implementations must not mutate shared state beyond issuing calls through
/// the retrying HTTP client; fan-out and dependency sequencing belong to the
/// batch scheduler.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Which source this fetcher talks to
    fn source(&self) -> Source;

    /// Fetch one product's data from this source.
    ///
    /// Never returns a transport error directly: every failure is folded
    /// into [`SourceResult::Error`] so the pipeline degrades per source
    /// instead of aborting.
    async fn fetch(&self, request: &FetchRequest) -> SourceResult;
}

/// The three fetchers the scheduler fans out across.
#[derive(Clone)]
pub struct FetcherSet {
    /// Catalog/price/rank lookup
    pub catalog: Arc<dyn SourceFetcher>,
    /// Historical price/sales analysis
    pub price_history: Arc<dyn SourceFetcher>,
    /// Competitor price search
    pub competitor: Arc<dyn SourceFetcher>,
}

impl FetcherSet {
    /// Build the production fetcher set from pipeline configuration.
    ///
    /// Each fetcher gets its own rate limiter and retry policy per the
    /// source's tuning; the HTTP client is shared globally.
    pub fn from_config(config: &crate::scheduler::PipelineConfig) -> Self {
        Self {
            catalog: Arc::new(catalog::CatalogFetcher::new(&config.catalog)),
            price_history: Arc::new(price_history::PriceHistoryFetcher::new(
                &config.price_history,
            )),
            competitor: Arc::new(competitor::CompetitorPriceFetcher::new(
                &config.competitor_price,
            )),
        }
    }

    /// Construct a set from explicit fetchers (used by tests and embedders).
    pub fn from_parts(
        catalog: Arc<dyn SourceFetcher>,
        price_history: Arc<dyn SourceFetcher>,
        competitor: Arc<dyn SourceFetcher>,
    ) -> Self {
        Self {
            catalog,
            price_history,
            competitor,
        }
    }
}
