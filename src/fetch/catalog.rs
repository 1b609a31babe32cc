//! Catalog lookup fetcher (JAN → marketplace listing match)

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::config::{SourceEndpoint, CATALOG_ENDPOINT};
use super::http::{HttpPayload, SourceHttpClient};
use super::parser::SourceParser;
use super::retry::RetryPolicy;
use super::{FetchErrorKind, FetchRequest, Source, SourceFetcher, SourcePayload, SourceResult};
use crate::metrics;
use crate::scheduler::config::SourceTuning;
use crate::scheduler::rate_limit::RateLimiter;

/// Fetches the catalog match for a JAN code.
///
/// Stateless beyond its HTTP client; the mapping from the raw catalog
/// response to [`crate::MatchedAsin`] lives in [`SourceParser`].
pub struct CatalogFetcher {
    http: SourceHttpClient,
    search_path: &'static str,
    credential: Option<(&'static str, String)>,
}

impl CatalogFetcher {
    /// Create a catalog fetcher from source tuning.
    pub fn new(tuning: &SourceTuning) -> Self {
        Self::with_endpoint(tuning, &CATALOG_ENDPOINT)
    }

    fn with_endpoint(tuning: &SourceTuning, endpoint: &SourceEndpoint) -> Self {
        let limiter = Arc::new(RateLimiter::new(tuning.rate_capacity, tuning.refill_per_sec));
        let base_url = tuning
            .base_url
            .clone()
            .unwrap_or_else(|| endpoint.base_url.to_string());
        let credential = endpoint
            .key_param
            .zip(tuning.api_key.clone());

        Self {
            http: SourceHttpClient::new(base_url, limiter, RetryPolicy::from_tuning(tuning)),
            search_path: endpoint.search_path,
            credential,
        }
    }
}

#[async_trait]
impl SourceFetcher for CatalogFetcher {
    fn source(&self) -> Source {
        Source::Catalog
    }

    async fn fetch(&self, request: &FetchRequest) -> SourceResult {
        let jan = request.product.jan_code.as_str();
        let mut params: Vec<(&str, String)> = vec![("jan", jan.to_string())];
        if let Some((param, key)) = &self.credential {
            params.push((param, key.clone()));
        }

        match self.http.get::<Value>(self.search_path, &params).await {
            Ok(call) => {
                metrics::record_fetch_attempts(Source::Catalog, call.attempts);
                match call.value {
                    HttpPayload::NoContent => {
                        debug!(jan, "catalog has no listing");
                        SourceResult::NotFound
                    }
                    HttpPayload::Data(body) => match SourceParser::parse_catalog(&body) {
                        Ok(Some(matched)) => {
                            debug!(jan, asin = %matched.asin, "catalog match");
                            SourceResult::Success(SourcePayload::Catalog(matched))
                        }
                        Ok(None) => SourceResult::NotFound,
                        Err(e) => {
                            warn!(jan, error = %e, "catalog response failed field mapping");
                            SourceResult::Error(FetchErrorKind::PermanentFetchError)
                        }
                    },
                }
            }
            Err(e) => {
                let kind = e.kind();
                warn!(jan, error = %e, "catalog fetch failed");
                metrics::record_fetch_attempts(Source::Catalog, e.attempts());
                metrics::record_fetch_failure(Source::Catalog, kind);
                SourceResult::Error(kind)
            }
        }
    }
}
