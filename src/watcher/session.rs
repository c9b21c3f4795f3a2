//! Watcher session state
//!
//! A session is mutated only by the task consuming the stream. Each message
//! is applied and fully dispatched before the next one is read.

use crate::job::{error_text, Document, JobHandle, JobState};
use crate::watcher::events::{Subscriptions, WatchEvent};
use crate::watcher::message::InboundMessage;

/// Lifecycle of a watcher connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    Connecting,
    Streaming,
    Done,
    Error,
}

impl WatchPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// Whether the consuming task should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Aggregated view of a job observed through its event stream
#[derive(Debug, Clone)]
pub struct WatcherSession {
    job: JobHandle,
    status: JobState,
    phase: WatchPhase,
    documents: Vec<Document>,
    total_expected: u64,
    error: Option<String>,
}

impl WatcherSession {
    pub fn new(job: JobHandle) -> Self {
        Self {
            job,
            status: JobState::Scraping,
            phase: WatchPhase::Connecting,
            documents: Vec::new(),
            total_expected: 0,
            error: None,
        }
    }

    pub fn job(&self) -> &JobHandle {
        &self.job
    }

    /// Last status observed on the stream
    pub fn status(&self) -> JobState {
        self.status
    }

    pub fn phase(&self) -> WatchPhase {
        self.phase
    }

    /// Every document received so far, in arrival order, duplicates included
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Number of documents received; never decreases
    pub fn completed_count(&self) -> u64 {
        self.documents.len() as u64
    }

    pub fn total_expected(&self) -> u64 {
        self.total_expected
    }

    /// Server error text after an `error` message
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn mark_streaming(&mut self) {
        if self.phase == WatchPhase::Connecting {
            self.phase = WatchPhase::Streaming;
        }
    }

    /// Applies one raw text frame
    ///
    /// Frames that do not parse as a known message are logged and skipped.
    pub fn handle_text(&mut self, text: &str, subscriptions: &Subscriptions) -> Flow {
        match InboundMessage::parse(text) {
            Ok(message) => self.handle_message(message, subscriptions),
            Err(e) => {
                tracing::warn!(job = %self.job, "Skipping unreadable stream message: {}", e);
                if self.phase.is_terminal() {
                    Flow::Stop
                } else {
                    Flow::Continue
                }
            }
        }
    }

    /// Applies one message and dispatches the resulting events
    pub fn handle_message(&mut self, message: InboundMessage, subscriptions: &Subscriptions) -> Flow {
        if self.phase.is_terminal() {
            tracing::debug!(job = %self.job, "Ignoring message after terminal event");
            return Flow::Stop;
        }
        self.mark_streaming();

        match message {
            InboundMessage::Catchup { data } => {
                match JobState::from_api_str(&data.status) {
                    Some(status) => self.status = status,
                    None => tracing::warn!(
                        job = %self.job,
                        "Catch-up reported unrecognized status '{}', keeping '{}'",
                        data.status,
                        self.status
                    ),
                }
                if let Some(total) = data.total {
                    self.total_expected = total;
                }

                tracing::debug!(
                    job = %self.job,
                    status = %self.status,
                    received = data.data.len(),
                    "Applying catch-up"
                );
                self.documents.extend(data.data);

                // Replay the whole running total so late subscribers see everything
                for document in &self.documents {
                    subscriptions.dispatch(&WatchEvent::Document(document.clone()));
                }
                Flow::Continue
            }
            InboundMessage::Document { data } => {
                self.documents.push(data.clone());
                subscriptions.dispatch(&WatchEvent::Document(data));
                Flow::Continue
            }
            InboundMessage::Done {} => {
                self.status = JobState::Completed;
                self.phase = WatchPhase::Done;
                tracing::info!(
                    job = %self.job,
                    "Crawl job completed with {} documents",
                    self.documents.len()
                );
                subscriptions.dispatch(&WatchEvent::Done {
                    status: self.status,
                    documents: self.documents.clone(),
                });
                Flow::Stop
            }
            InboundMessage::Error { error } => {
                let error = error_text(error).unwrap_or_else(|| "No error message provided.".to_string());
                self.status = JobState::Failed;
                self.phase = WatchPhase::Error;
                self.error = Some(error.clone());
                tracing::info!(job = %self.job, "Crawl job failed: {}", error);
                subscriptions.dispatch(&WatchEvent::Error {
                    status: self.status,
                    documents: self.documents.clone(),
                    error,
                });
                Flow::Stop
            }
        }
    }
}
