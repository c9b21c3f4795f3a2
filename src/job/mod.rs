//! Crawl job model and the polling monitor
//!
//! This module contains:
//! - `JobState`: the remote service's job status vocabulary
//! - The job handle, status snapshot, and document types
//! - `JobPoller`: drives a submitted job to a terminal state by polling

mod poller;
mod state;
mod types;

pub use poller::{JobPoller, MIN_POLL_INTERVAL};
pub use state::JobState;
pub use types::{CrawlResult, Document, JobHandle, JobStatusSnapshot};

pub(crate) use types::{error_text, StatusResponse};
