//! Rate-limited, retrying HTTP access shared by the source fetchers
//!
//! Provides a unified client for all external API interactions:
//! - Generic GET with typed deserialization
//! - Per-source rate limiter admission before every attempt
//! - Exponential backoff retry via [`super::retry`]
//! - Transient vs. permanent response classification
//!
//! External APIs enforce quotas per credential, so all fetcher instances for
//! one source must share that source's limiter; the underlying HTTP client
//! is a process-wide singleton for connection pooling.

use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use super::retry::{call_with_retry, AttemptError, CallSuccess, RetryError, RetryPolicy};
use crate::scheduler::rate_limit::RateLimiter;

/// HTTP connect timeout - time to establish a TCP connection
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
/// HTTP request timeout - overall budget for one attempt
const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Global HTTP client shared by all fetcher instances.
///
/// Configured with explicit timeouts so a stalled source surfaces as a
/// transient attempt failure instead of an indefinite hang.
static GLOBAL_HTTP_CLIENT: Lazy<Arc<Client>> = Lazy::new(|| {
    Arc::new(
        Client::builder()
            .connect_timeout(std::time::Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(std::time::Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                panic!("FATAL: failed to build HTTP client: {e}. Check system TLS configuration.")
            }),
    )
});

/// Get the global HTTP client (cheap Arc clone).
pub fn global_http_client() -> Arc<Client> {
    GLOBAL_HTTP_CLIENT.clone()
}

/// Response body, with "the source has no data" distinguished from failure.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpPayload<T> {
    /// Deserialized response body
    Data(T),
    /// The source responded 404 for this key — no data, not an error
    NoContent,
}

/// HTTP client bound to one source's base URL, rate limiter, and retry policy.
pub struct SourceHttpClient {
    client: Arc<Client>,
    base_url: String,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl SourceHttpClient {
    /// Create a client for one source.
    pub fn new(
        base_url: impl Into<String>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client: global_http_client(),
            base_url: base_url.into(),
            limiter,
            policy,
        }
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute a GET as one logical call: rate-limited, retried, deserialized.
    ///
    /// # Errors
    /// [`RetryError`] carrying the terminal classification; callers fold it
    /// into a per-source [`super::FetchErrorKind`].
    pub async fn get<T>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<CallSuccess<HttpPayload<T>>, RetryError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(url = %url, params = params.len(), "issuing GET");

        call_with_retry(&self.policy, &self.limiter, |attempt| {
            let client = self.client.clone();
            let url = url.clone();
            let params: Vec<(String, String)> = params
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect();
            async move {
                debug!(url = %url, attempt, "sending request");
                let response = client
                    .get(&url)
                    .query(&params)
                    .send()
                    .await
                    .map_err(|e| AttemptError::Transient(format!("request failed: {e}")))?;

                let status = response.status();
                if let Some(classified) = classify_status(status) {
                    let body = response.text().await.unwrap_or_default();
                    return Err(classified(format!("{status}: {body}")));
                }

                if status == StatusCode::NOT_FOUND {
                    return Ok(HttpPayload::NoContent);
                }

                response
                    .json::<T>()
                    .await
                    .map(HttpPayload::Data)
                    .map_err(|e| AttemptError::Permanent(format!("malformed response: {e}")))
            }
        })
        .await
    }
}

/// Map a status code to its attempt-failure constructor, or `None` when the
/// response should be consumed (2xx and 404).
fn classify_status(status: StatusCode) -> Option<fn(String) -> AttemptError> {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Some(AttemptError::Transient)
    } else if status == StatusCode::NOT_FOUND || status.is_success() {
        None
    } else if status.is_client_error() {
        Some(AttemptError::Permanent)
    } else {
        // Redirects and informational responses the client did not resolve.
        Some(AttemptError::Transient)
    }
}
