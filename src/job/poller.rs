//! Status polling monitor
//!
//! Drives a submitted job through `Polling -> (Completed | Failed)`. Results
//! are only paginated once the job has completed; cursors reported while the
//! job is still running are ignored.

use crate::job::{
    error_text, CrawlResult, Document, JobHandle, JobState, JobStatusSnapshot, StatusResponse,
};
use crate::transport::{error_from_response, Transport};
use crate::CrawlError;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Lower bound on the time between two status polls
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(2);

const CHECK_STATUS: &str = "check crawl status";
const FETCH_PAGE: &str = "fetch crawl results page";

/// Polls one job until it reaches a terminal state
#[derive(Debug, Clone, Copy)]
pub struct JobPoller<'a> {
    transport: &'a Transport,
    base_url: &'a str,
}

impl<'a> JobPoller<'a> {
    pub fn new(transport: &'a Transport, base_url: &'a str) -> Self {
        Self {
            transport,
            base_url,
        }
    }

    /// Interval actually used for a requested one
    pub fn effective_interval(requested: Duration) -> Duration {
        requested.max(MIN_POLL_INTERVAL)
    }

    fn status_url(&self, job: &JobHandle) -> String {
        format!("{}/v1/crawl/{}", self.base_url, job.id())
    }

    /// Issues a single status request and interprets it
    pub async fn fetch_status(&self, job: &JobHandle) -> Result<JobStatusSnapshot, CrawlError> {
        self.fetch(job, &self.status_url(job), CHECK_STATUS)
            .await?
            .into_snapshot(job.id())
    }

    async fn fetch(
        &self,
        job: &JobHandle,
        url: &str,
        action: &str,
    ) -> Result<StatusResponse, CrawlError> {
        let response = self.transport.get(url).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response, action).await);
        }

        let body = response.bytes().await?;
        StatusResponse::parse(job.id(), &body)
    }

    /// Waits for the job to finish and returns every document it produced
    ///
    /// Occupies the calling task for the job's whole lifetime. Between polls
    /// the task sleeps for `poll_interval`, floored at [`MIN_POLL_INTERVAL`].
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlResult)` - The job completed; documents are in cursor order
    /// * `Err(CrawlError::JobFailed)` - The job reached the `failed` state
    /// * `Err(CrawlError::Api)` - A status request returned a non-2xx response
    /// * `Err(CrawlError::Protocol)` - The service reported something unusable
    pub async fn wait_for_completion(
        &self,
        job: &JobHandle,
        poll_interval: Duration,
    ) -> Result<CrawlResult, CrawlError> {
        let interval = Self::effective_interval(poll_interval);
        let url = self.status_url(job);
        let mut highest_completed = 0;

        tracing::info!(job = %job, "Polling crawl job every {:?}", interval);

        loop {
            let response = self.fetch(job, &url, CHECK_STATUS).await?;
            let state = response.state(job.id())?;

            let completed = response.completed.unwrap_or(0);
            if completed < highest_completed {
                tracing::warn!(
                    job = %job,
                    "Completed count went backwards ({} -> {}), keeping {}",
                    highest_completed,
                    completed,
                    highest_completed
                );
            }
            highest_completed = highest_completed.max(completed);

            tracing::debug!(
                job = %job,
                status = %state,
                completed = highest_completed,
                total = response.total.unwrap_or(0),
                "Polled crawl job"
            );

            match state {
                JobState::Completed => {
                    tracing::info!(job = %job, "Crawl job completed, collecting results");
                    let mut result = self.collect_results(job, response).await?;
                    result.completed_count = result.completed_count.max(highest_completed);
                    return Ok(result);
                }
                JobState::Failed => {
                    let error = error_text(response.error)
                        .unwrap_or_else(|| "No error message provided.".to_string());
                    tracing::info!(job = %job, "Crawl job failed: {}", error);
                    return Err(CrawlError::JobFailed {
                        job_id: job.id().to_string(),
                        error,
                    });
                }
                _ => tokio::time::sleep(interval).await,
            }
        }
    }

    /// Follows result cursors from a completed status response
    ///
    /// Pages are appended in cursor order until a page carries no cursor.
    async fn collect_results(
        &self,
        job: &JobHandle,
        first: StatusResponse,
    ) -> Result<CrawlResult, CrawlError> {
        let mut documents: Vec<Document> = first.data.ok_or_else(|| {
            CrawlError::protocol(job.id(), "crawl job completed but no data was returned")
        })?;

        let mut seen = HashSet::new();
        let mut cursor = first.next;
        let mut pages = 1;

        while let Some(next) = cursor {
            let url = self.resolve_cursor(&next)?;
            if !seen.insert(url.clone()) {
                return Err(CrawlError::protocol(
                    job.id(),
                    format!("result cursor '{}' was returned twice", url),
                ));
            }

            let page = self.fetch(job, &url, FETCH_PAGE).await?;
            let data = page.data.ok_or_else(|| {
                CrawlError::protocol(job.id(), format!("result page '{}' carries no data", url))
            })?;
            tracing::debug!(job = %job, page = pages + 1, documents = data.len(), "Fetched result page");

            documents.extend(data);
            cursor = page.next;
            pages += 1;
        }

        tracing::info!(
            job = %job,
            "Collected {} documents across {} result pages",
            documents.len(),
            pages
        );

        Ok(CrawlResult {
            job: job.clone(),
            state: JobState::Completed,
            total_expected: first.total.unwrap_or(0),
            completed_count: first.completed.unwrap_or(0),
            credits_used: first.credits_used,
            expires_at: first.expires_at,
            documents,
        })
    }

    /// Cursors are normally absolute URLs; relative ones resolve against the base URL
    fn resolve_cursor(&self, next: &str) -> Result<String, CrawlError> {
        match Url::parse(next) {
            Ok(url) => Ok(url.into()),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Ok(Url::parse(self.base_url)?.join(next)?.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
