//! HTTP transport for the crawl service
//!
//! This module owns every HTTP request the client makes:
//! - Building the HTTP client and the authenticated header set
//! - Retrying HTTP 502 responses with exponential backoff
//! - Classifying non-2xx responses into actionable failures

mod classify;
mod retry;

pub use classify::{classify, error_from_response, ApiError, ErrorCategory};
pub use retry::{RetryPolicy, DEFAULT_BACKOFF_BASE, DEFAULT_MAX_RETRIES};

use crate::{ConfigError, CrawlError};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Header carrying a caller supplied idempotency key on submissions
pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

/// Builds the HTTP client used for every API call
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("crawl-conductor/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Authenticated, retrying request sender
///
/// Stateless across calls; clones share the underlying connection pool and
/// may be used from any number of tasks at once.
#[derive(Clone)]
pub struct Transport {
    client: Client,
    api_key: String,
    authorization: HeaderValue,
    policy: RetryPolicy,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Creates a transport that authenticates with the given bearer token
    ///
    /// # Returns
    ///
    /// * `Err(CrawlError::Config)` - The token is empty or not a valid header value
    /// * `Err(CrawlError::Http)` - The HTTP client could not be built
    pub fn new(api_key: &str, policy: RetryPolicy) -> Result<Self, CrawlError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey.into());
        }

        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| {
                ConfigError::Validation("API key contains invalid header characters".to_string())
            })?;
        authorization.set_sensitive(true);

        Ok(Self {
            client: build_http_client()?,
            api_key: api_key.to_string(),
            authorization,
            policy,
        })
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Header set sent with every request
    pub fn headers(&self, idempotency_key: Option<&str>) -> Result<HeaderMap, CrawlError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, self.authorization.clone());

        if let Some(key) = idempotency_key {
            let value = HeaderValue::from_str(key).map_err(|_| {
                ConfigError::Validation(format!("Invalid idempotency key '{}'", key))
            })?;
            headers.insert(IDEMPOTENCY_HEADER, value);
        }

        Ok(headers)
    }

    /// Sends one request, retrying while the upstream answers 502
    ///
    /// Any other status, success included, is returned immediately. When
    /// every attempt returns 502 the last response is returned rather than
    /// an error, so the caller's classification path still runs.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        idempotency_key: Option<&str>,
    ) -> Result<Response, CrawlError> {
        let headers = self.headers(idempotency_key)?;
        let mut attempt = 0;

        loop {
            let mut request = self
                .client
                .request(method.clone(), url)
                .headers(headers.clone());
            if let Some(body) = body {
                request = request.json(body);
            }

            tracing::debug!(%method, url, attempt, "Sending request");
            let response = request.send().await?;

            if response.status() != StatusCode::BAD_GATEWAY {
                return Ok(response);
            }

            if attempt + 1 >= self.policy.max_retries {
                tracing::warn!(
                    %method,
                    url,
                    "Upstream still unavailable after {} attempts",
                    self.policy.max_retries
                );
                return Ok(response);
            }

            let delay = self.policy.delay_for(attempt);
            tracing::warn!(
                %method,
                url,
                attempt,
                "Upstream returned 502, retrying in {:?}",
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    pub async fn get(&self, url: &str) -> Result<Response, CrawlError> {
        self.send(Method::GET, url, None, None).await
    }

    pub async fn post(
        &self,
        url: &str,
        body: &Value,
        idempotency_key: Option<&str>,
    ) -> Result<Response, CrawlError> {
        self.send(Method::POST, url, Some(body), idempotency_key)
            .await
    }

    pub async fn delete(&self, url: &str) -> Result<Response, CrawlError> {
        self.send(Method::DELETE, url, None, None).await
    }
}
