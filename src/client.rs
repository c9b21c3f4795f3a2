//! Crawl client facade
//!
//! The single entry point for submitting crawl jobs. A submitted job is either
//! polled to completion ([`CrawlClient::crawl_url`]) or handed back as a live
//! [`CrawlWatcher`] ([`CrawlClient::crawl_url_and_watch`]).
//!
//! # Example
//!
//! ```no_run
//! use crawl_conductor::{ClientSettings, CrawlClient, CrawlOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), crawl_conductor::CrawlError> {
//! let client = CrawlClient::new(ClientSettings::new("fc-..."))?;
//! let options = CrawlOptions::default().with_limit(10);
//! let result = client
//!     .crawl_url("https://example.com", &options, Duration::from_secs(2), None)
//!     .await?;
//! println!("Crawled {} pages", result.documents.len());
//! # Ok(())
//! # }
//! ```

use crate::config::ClientSettings;
use crate::job::{error_text, CrawlResult, Document, JobHandle, JobPoller, JobStatusSnapshot};
use crate::transport::{error_from_response, RetryPolicy, Transport};
use crate::watcher::{stream_url, CrawlWatcher};
use crate::{ConfigError, CrawlError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Options for a crawl submission
///
/// Known fields are typed; anything else goes into `extra` and is sent as-is
/// at the top level of the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_paths: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_paths: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_sitemap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_backward_links: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_external_links: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrape_options: Option<ScrapeOptions>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CrawlOptions {
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Output formats requested for every crawled page
    pub fn with_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scrape = self.scrape_options.get_or_insert_with(ScrapeOptions::default);
        scrape.formats = Some(formats.into_iter().map(Into::into).collect());
        self
    }

    /// Sets a request field that has no typed counterpart
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Options for a single-page scrape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formats: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_main_content: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Options for a site map request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOptions {
    /// Only return links related to this search term
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_sitemap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_subdomains: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize)]
struct TargetedRequest<'a, T> {
    url: &'a str,
    #[serde(flatten)]
    options: &'a T,
}

/// Body of a successful submission
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct MapResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    links: Option<Vec<String>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Document>,
    #[serde(default)]
    error: Option<Value>,
}

/// Client for the remote crawl service
#[derive(Debug, Clone)]
pub struct CrawlClient {
    base_url: String,
    transport: Transport,
}

impl CrawlClient {
    /// Creates a client from resolved settings
    ///
    /// # Returns
    ///
    /// * `Err(CrawlError::Config(ConfigError::MissingApiKey))` - No bearer token was supplied
    pub fn new(settings: ClientSettings) -> Result<Self, CrawlError> {
        let api_key = settings
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let base_url = settings.base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base URL '{}': {}", base_url, e)))?;

        let transport = Transport::new(api_key, RetryPolicy::from(&settings))?;
        tracing::debug!(base_url = %base_url, "Initialized crawl client");

        Ok(Self {
            base_url,
            transport,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn poller(&self) -> JobPoller<'_> {
        JobPoller::new(&self.transport, &self.base_url)
    }

    /// Submits a crawl job and returns its handle without waiting
    pub async fn async_crawl_url(
        &self,
        url: &str,
        options: &CrawlOptions,
        idempotency_key: Option<&str>,
    ) -> Result<JobHandle, CrawlError> {
        let body = serde_json::to_value(TargetedRequest { url, options })?;
        let response = self
            .transport
            .post(&self.endpoint("/v1/crawl"), &body, idempotency_key)
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "start crawl job").await);
        }

        let submitted: SubmitResponse = serde_json::from_slice(&response.bytes().await?)
            .map_err(|e| submission_violation(format!("unreadable response: {}", e)))?;

        if submitted.success == Some(false) {
            return Err(submission_violation(format!(
                "service reported failure: {}",
                error_text(submitted.error).unwrap_or_else(|| "no error message provided".to_string())
            )));
        }

        let id = submitted
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| submission_violation("response carries no job id"))?;

        tracing::info!(job = %id, url, "Submitted crawl job");
        Ok(JobHandle::new(id))
    }

    /// Submits a crawl job and waits for its aggregated result
    pub async fn crawl_url(
        &self,
        url: &str,
        options: &CrawlOptions,
        poll_interval: Duration,
        idempotency_key: Option<&str>,
    ) -> Result<CrawlResult, CrawlError> {
        let job = self.async_crawl_url(url, options, idempotency_key).await?;
        self.wait_for_job(&job, poll_interval).await
    }

    /// Waits for an already submitted job
    pub async fn wait_for_job(
        &self,
        job: &JobHandle,
        poll_interval: Duration,
    ) -> Result<CrawlResult, CrawlError> {
        self.poller().wait_for_completion(job, poll_interval).await
    }

    /// Fetches one status snapshot without following result cursors
    pub async fn check_crawl_status(&self, id: &str) -> Result<JobStatusSnapshot, CrawlError> {
        self.poller().fetch_status(&JobHandle::new(id)).await
    }

    /// Asks the service to cancel a job
    ///
    /// Independent of any poll loop or watch running for the same job.
    pub async fn cancel_crawl(&self, id: &str) -> Result<Value, CrawlError> {
        let response = self
            .transport
            .delete(&self.endpoint(&format!("/v1/crawl/{}", id)))
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "cancel crawl job").await);
        }

        tracing::info!(job = id, "Cancelled crawl job");
        Ok(response.json().await?)
    }

    /// Submits a crawl job and returns a watcher for its event stream
    ///
    /// The watcher is not connected yet; register subscribers, then call
    /// [`CrawlWatcher::connect`] or [`CrawlWatcher::spawn`].
    pub async fn crawl_url_and_watch(
        &self,
        url: &str,
        options: &CrawlOptions,
        idempotency_key: Option<&str>,
    ) -> Result<CrawlWatcher, CrawlError> {
        let job = self.async_crawl_url(url, options, idempotency_key).await?;
        self.watch(job)
    }

    /// Creates a watcher for an existing job
    pub fn watch(&self, job: JobHandle) -> Result<CrawlWatcher, CrawlError> {
        let ws_url = stream_url(&self.base_url, &job)?;
        Ok(CrawlWatcher::new(job, ws_url, self.transport.api_key()))
    }

    /// Scrapes a single page synchronously
    pub async fn scrape_url(
        &self,
        url: &str,
        options: &ScrapeOptions,
    ) -> Result<Document, CrawlError> {
        let body = serde_json::to_value(TargetedRequest { url, options })?;
        let response = self
            .transport
            .post(&self.endpoint("/v1/scrape"), &body, None)
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "scrape URL").await);
        }

        let scraped: ScrapeResponse = serde_json::from_slice(&response.bytes().await?)?;
        match scraped.data {
            Some(document) if scraped.success => Ok(document),
            _ => Err(CrawlError::Protocol {
                context: format!("scrape of {}", url),
                detail: format!(
                    "Failed to scrape URL. Error: {}",
                    error_text(scraped.error).unwrap_or_else(|| "no data returned".to_string())
                ),
            }),
        }
    }

    /// Lists the URLs reachable from a site without scraping them
    pub async fn map_url(&self, url: &str, options: &MapOptions) -> Result<Vec<String>, CrawlError> {
        let body = serde_json::to_value(TargetedRequest { url, options })?;
        let response = self
            .transport
            .post(&self.endpoint("/v1/map"), &body, None)
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "map").await);
        }

        let mapped: MapResponse = serde_json::from_slice(&response.bytes().await?)?;
        match mapped.links {
            Some(links) if mapped.success => {
                tracing::debug!(url, links = links.len(), "Mapped site");
                Ok(links)
            }
            _ => Err(CrawlError::Protocol {
                context: format!("map of {}", url),
                detail: format!(
                    "Failed to map URL. Error: {}",
                    error_text(mapped.error).unwrap_or_else(|| "no links returned".to_string())
                ),
            }),
        }
    }
}

fn submission_violation(detail: impl Into<String>) -> CrawlError {
    CrawlError::Protocol {
        context: "crawl submission".to_string(),
        detail: detail.into(),
    }
}
