use crate::job::JobState;
use crate::CrawlError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifies one submitted crawl job
///
/// The id is assigned by the remote service and cannot change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JobHandle {
    id: String,
}

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// One scraped page as returned by the service
///
/// The payload is kept as-is; the job monitors only aggregate documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Value);

impl Document {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// URL of the page this document was scraped from, when reported
    pub fn source_url(&self) -> Option<&str> {
        let metadata = self.0.get("metadata")?;
        metadata
            .get("sourceURL")
            .or_else(|| metadata.get("url"))
            .and_then(Value::as_str)
    }

    /// Markdown rendition of the page, when requested in the scrape formats
    pub fn markdown(&self) -> Option<&str> {
        self.0.get("markdown").and_then(Value::as_str)
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Point-in-time view of a job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusSnapshot {
    pub state: JobState,
    pub total_expected: u64,
    pub completed_count: u64,
    pub credits_used: Option<Value>,
    pub expires_at: Option<Value>,
    /// Continuation URL for the next result page
    pub next_cursor: Option<String>,
    pub documents: Vec<Document>,
    /// Server error text; only ever set for failed jobs
    pub error: Option<String>,
}

/// Final aggregated result of a completed job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlResult {
    pub job: JobHandle,
    pub state: JobState,
    pub total_expected: u64,
    pub completed_count: u64,
    pub credits_used: Option<Value>,
    pub expires_at: Option<Value>,
    /// Every page's documents, in cursor order
    pub documents: Vec<Document>,
}

/// Renders a server `error` field as text
///
/// Strings are taken as-is; any other JSON value keeps its JSON rendering.
pub(crate) fn error_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Wire shape of a status or result-page response
///
/// Every field is optional because follow-up result pages may carry only
/// `data` and `next`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusResponse {
    pub status: Option<String>,
    pub total: Option<u64>,
    pub completed: Option<u64>,
    pub credits_used: Option<Value>,
    pub expires_at: Option<Value>,
    pub next: Option<String>,
    pub data: Option<Vec<Document>>,
    /// Usually a string, but structured payloads are accepted too
    pub error: Option<Value>,
}

impl StatusResponse {
    pub fn parse(job_id: &str, body: &[u8]) -> Result<Self, CrawlError> {
        serde_json::from_slice(body)
            .map_err(|e| CrawlError::protocol(job_id, format!("malformed status response: {}", e)))
    }

    /// Parses the reported status into the known vocabulary
    pub fn state(&self, job_id: &str) -> Result<JobState, CrawlError> {
        let raw = self
            .status
            .as_deref()
            .ok_or_else(|| CrawlError::protocol(job_id, "status response carries no status"))?;

        JobState::from_api_str(raw)
            .ok_or_else(|| CrawlError::protocol(job_id, format!("unrecognized job status '{}'", raw)))
    }

    pub fn into_snapshot(self, job_id: &str) -> Result<JobStatusSnapshot, CrawlError> {
        let state = self.state(job_id)?;
        Ok(JobStatusSnapshot {
            state,
            total_expected: self.total.unwrap_or(0),
            completed_count: self.completed.unwrap_or(0),
            credits_used: self.credits_used,
            expires_at: self.expires_at,
            next_cursor: self.next,
            documents: self.data.unwrap_or_default(),
            error: if state == JobState::Failed {
                error_text(self.error)
            } else {
                None
            },
        })
    }
}
