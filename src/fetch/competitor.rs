//! Competitor price fetcher (JAN → marketplace offers)
//!
//! Competitor search spans two marketplaces (Yahoo Shopping and Rakuten
//! Ichiba) but is one logical source from the pipeline's point of view:
//! both queries share a single rate limiter for the search quota tier and
//! their quotes are combined into one result. Quotes from either
//! marketplace are enough for a `Success`; the fetch only errors when
//! neither marketplace produced data and at least one failed.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::config::{SourceEndpoint, RAKUTEN_ICHIBA_ENDPOINT, YAHOO_SHOPPING_ENDPOINT};
use super::http::{HttpPayload, SourceHttpClient};
use super::parser::{ParseError, SourceParser};
use super::retry::RetryPolicy;
use super::{FetchErrorKind, FetchRequest, Source, SourceFetcher, SourcePayload, SourceResult};
use crate::metrics;
use crate::scheduler::config::SourceTuning;
use crate::scheduler::rate_limit::RateLimiter;
use crate::CompetitorQuote;

/// Result of querying one marketplace.
enum MarketplaceResult {
    Quotes(Vec<CompetitorQuote>),
    Empty,
    Failed(FetchErrorKind),
}

/// Fetches competitor offers for a JAN from both marketplaces.
pub struct CompetitorPriceFetcher {
    yahoo: SourceHttpClient,
    yahoo_path: &'static str,
    yahoo_credential: Option<(&'static str, String)>,
    rakuten: SourceHttpClient,
    rakuten_path: &'static str,
    rakuten_credential: Option<(&'static str, String)>,
}

impl CompetitorPriceFetcher {
    /// Create a competitor fetcher from source tuning.
    ///
    /// Both marketplace clients share one token bucket: the tuning describes
    /// the combined search quota, not a per-marketplace one.
    pub fn new(tuning: &SourceTuning) -> Self {
        let limiter = Arc::new(RateLimiter::new(tuning.rate_capacity, tuning.refill_per_sec));
        let policy = RetryPolicy::from_tuning(tuning);

        let make_client = |endpoint: &SourceEndpoint| {
            let base_url = tuning
                .base_url
                .clone()
                .unwrap_or_else(|| endpoint.base_url.to_string());
            SourceHttpClient::new(base_url, limiter.clone(), policy.clone())
        };

        Self {
            yahoo: make_client(&YAHOO_SHOPPING_ENDPOINT),
            yahoo_path: YAHOO_SHOPPING_ENDPOINT.search_path,
            yahoo_credential: YAHOO_SHOPPING_ENDPOINT.key_param.zip(tuning.api_key.clone()),
            rakuten: make_client(&RAKUTEN_ICHIBA_ENDPOINT),
            rakuten_path: RAKUTEN_ICHIBA_ENDPOINT.search_path,
            rakuten_credential: RAKUTEN_ICHIBA_ENDPOINT
                .key_param
                .zip(tuning.api_key.clone()),
        }
    }

    async fn query_marketplace(
        &self,
        client: &SourceHttpClient,
        path: &'static str,
        credential: &Option<(&'static str, String)>,
        jan: &str,
        parse: fn(&Value) -> Result<Vec<CompetitorQuote>, ParseError>,
    ) -> MarketplaceResult {
        let mut params: Vec<(&str, String)> = vec![("jan_code", jan.to_string())];
        if let Some((param, key)) = credential {
            params.push((param, key.clone()));
        }

        match client.get::<Value>(path, &params).await {
            Ok(call) => {
                metrics::record_fetch_attempts(Source::CompetitorPrice, call.attempts);
                match call.value {
                    HttpPayload::NoContent => MarketplaceResult::Empty,
                    HttpPayload::Data(body) => match parse(&body) {
                        Ok(quotes) if quotes.is_empty() => MarketplaceResult::Empty,
                        Ok(quotes) => MarketplaceResult::Quotes(quotes),
                        Err(e) => {
                            warn!(jan, error = %e, "competitor response failed field mapping");
                            MarketplaceResult::Failed(FetchErrorKind::PermanentFetchError)
                        }
                    },
                }
            }
            Err(e) => {
                let kind = e.kind();
                warn!(jan, error = %e, "competitor marketplace query failed");
                metrics::record_fetch_attempts(Source::CompetitorPrice, e.attempts());
                metrics::record_fetch_failure(Source::CompetitorPrice, kind);
                MarketplaceResult::Failed(kind)
            }
        }
    }
}

#[async_trait]
impl SourceFetcher for CompetitorPriceFetcher {
    fn source(&self) -> Source {
        Source::CompetitorPrice
    }

    async fn fetch(&self, request: &FetchRequest) -> SourceResult {
        let jan = request.product.jan_code.as_str();

        let (yahoo, rakuten) = tokio::join!(
            self.query_marketplace(
                &self.yahoo,
                self.yahoo_path,
                &self.yahoo_credential,
                jan,
                SourceParser::parse_yahoo_quotes,
            ),
            self.query_marketplace(
                &self.rakuten,
                self.rakuten_path,
                &self.rakuten_credential,
                jan,
                SourceParser::parse_rakuten_quotes,
            ),
        );

        let mut quotes = Vec::new();
        let mut failure: Option<FetchErrorKind> = None;
        for result in [yahoo, rakuten] {
            match result {
                MarketplaceResult::Quotes(mut q) => quotes.append(&mut q),
                MarketplaceResult::Empty => {}
                MarketplaceResult::Failed(kind) => failure = failure.or(Some(kind)),
            }
        }

        if !quotes.is_empty() {
            // Deterministic order: cheapest first, source name breaks ties.
            quotes.sort_by(|a, b| {
                a.competitor_price
                    .cmp(&b.competitor_price)
                    .then_with(|| a.competitor_source.cmp(&b.competitor_source))
            });
            debug!(jan, quotes = quotes.len(), "competitor quotes found");
            SourceResult::Success(SourcePayload::Competitor(quotes))
        } else if let Some(kind) = failure {
            SourceResult::Error(kind)
        } else {
            debug!(jan, "no competitor offers");
            SourceResult::NotFound
        }
    }
}
