//! Storage traits and error types
//!
//! This module defines the trait interface for content store backends and
//! associated error types.

use crate::job::{Document, JobHandle, JobState};
use crate::storage::{DocumentRecord, JobRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for content store implementations
///
/// Documents are append-only; the store never deduplicates them.
pub trait ContentStore {
    // ===== Job Management =====

    /// Records a newly submitted job
    fn record_job(&mut self, job: &JobHandle, url: &str, status: JobState) -> StorageResult<()>;

    /// Updates the last known status of a job
    fn update_job_status(&mut self, job: &JobHandle, status: JobState) -> StorageResult<()>;

    /// Gets a job by ID
    fn get_job(&self, job_id: &str) -> StorageResult<Option<JobRecord>>;

    // ===== Document Management =====

    /// Inserts one document for a job
    ///
    /// # Returns
    ///
    /// The row ID of the stored record
    fn insert_record(&mut self, job: &JobHandle, document: &Document) -> StorageResult<i64>;

    /// Inserts many documents for a job, preserving their order
    fn insert_records(&mut self, job: &JobHandle, documents: &[Document]) -> StorageResult<usize> {
        for document in documents {
            self.insert_record(job, document)?;
        }
        Ok(documents.len())
    }

    /// Gets every stored document of a job in insertion order
    fn records_for_job(&self, job_id: &str) -> StorageResult<Vec<DocumentRecord>>;

    /// Counts all stored documents
    fn count_records(&self) -> StorageResult<u64>;
}
