//! Storage module for persisting crawled documents
//!
//! This module is the content store the CLI writes results into:
//! - SQLite database initialization and schema management
//! - Job bookkeeping (submitted URL, last known status)
//! - Append-only document records with content hashes
//! - Reading documents back from JSON-lines exports

mod lines;
mod schema;
mod sqlite;
mod traits;

pub use lines::{read_lines, write_lines};
pub use sqlite::SqliteContentStore;
pub use traits::{ContentStore, StorageError, StorageResult};

use crate::job::{Document, JobState};
use sha2::{Digest, Sha256};

/// Represents a crawl job in the database
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: String,
    pub url: String,
    pub status: JobState,
    pub submitted_at: String,
    pub updated_at: String,
}

/// Represents one stored document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: i64,
    pub job_id: String,
    pub source_url: Option<String>,
    pub content_hash: String,
    pub document: Document,
    pub stored_at: String,
}

/// Hex SHA-256 of a document's canonical JSON text
pub fn content_hash(document: &Document) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.as_value().to_string().as_bytes());
    hex::encode(hasher.finalize())
}
