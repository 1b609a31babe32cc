//! Price history fetcher (ASIN → tracked price series + sales estimate)

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::config::{SourceEndpoint, PRICE_HISTORY_ENDPOINT};
use super::http::{HttpPayload, SourceHttpClient};
use super::parser::SourceParser;
use super::retry::RetryPolicy;
use super::{FetchErrorKind, FetchRequest, Source, SourceFetcher, SourcePayload, SourceResult};
use crate::metrics;
use crate::scheduler::config::SourceTuning;
use crate::scheduler::rate_limit::RateLimiter;

/// Fetches the price history analysis for a matched listing.
///
/// Requires the ASIN resolved by the catalog fetch; the batch scheduler
/// sequences that dependency and never invokes this fetcher without one.
pub struct PriceHistoryFetcher {
    http: SourceHttpClient,
    search_path: &'static str,
    credential: Option<(&'static str, String)>,
}

impl PriceHistoryFetcher {
    /// Create a price history fetcher from source tuning.
    pub fn new(tuning: &SourceTuning) -> Self {
        Self::with_endpoint(tuning, &PRICE_HISTORY_ENDPOINT)
    }

    fn with_endpoint(tuning: &SourceTuning, endpoint: &SourceEndpoint) -> Self {
        let limiter = Arc::new(RateLimiter::new(tuning.rate_capacity, tuning.refill_per_sec));
        let base_url = tuning
            .base_url
            .clone()
            .unwrap_or_else(|| endpoint.base_url.to_string());
        let credential = endpoint.key_param.zip(tuning.api_key.clone());

        Self {
            http: SourceHttpClient::new(base_url, limiter, RetryPolicy::from_tuning(tuning)),
            search_path: endpoint.search_path,
            credential,
        }
    }
}

#[async_trait]
impl SourceFetcher for PriceHistoryFetcher {
    fn source(&self) -> Source {
        Source::PriceHistory
    }

    async fn fetch(&self, request: &FetchRequest) -> SourceResult {
        let Some(asin) = request.asin.as_deref() else {
            // Scheduler contract violation; fail the branch rather than panic.
            warn!(jan = %request.product.jan_code, "price history fetch without resolved ASIN");
            return SourceResult::Error(FetchErrorKind::PermanentFetchError);
        };

        let mut params: Vec<(&str, String)> = vec![("asin", asin.to_string())];
        if let Some((param, key)) = &self.credential {
            params.push((param, key.clone()));
        }

        match self.http.get::<Value>(self.search_path, &params).await {
            Ok(call) => {
                metrics::record_fetch_attempts(Source::PriceHistory, call.attempts);
                match call.value {
                    HttpPayload::NoContent => {
                        debug!(asin, "no tracked history for listing");
                        SourceResult::NotFound
                    }
                    HttpPayload::Data(body) => match SourceParser::parse_price_history(&body) {
                        Ok(record) => {
                            let latest = record
                                .price_series
                                .last()
                                .map(|p| crate::format_timestamp(p.timestamp))
                                .unwrap_or_else(|| "none".to_string());
                            debug!(
                                asin,
                                points = record.price_series.len(),
                                monthly_sales = record.estimated_monthly_sales,
                                latest_observation = %latest,
                                "price history fetched"
                            );
                            SourceResult::Success(SourcePayload::PriceHistory(record))
                        }
                        Err(e) => {
                            warn!(asin, error = %e, "price history response failed field mapping");
                            SourceResult::Error(FetchErrorKind::PermanentFetchError)
                        }
                    },
                }
            }
            Err(e) => {
                let kind = e.kind();
                warn!(asin, error = %e, "price history fetch failed");
                metrics::record_fetch_attempts(Source::PriceHistory, e.attempts());
                metrics::record_fetch_failure(Source::PriceHistory, kind);
                SourceResult::Error(kind)
            }
        }
    }
}
