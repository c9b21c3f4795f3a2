//! SQLite content store
//!
//! This module provides a SQLite-based implementation of the ContentStore trait.

use crate::job::{Document, JobHandle, JobState};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ContentStore, StorageError, StorageResult};
use crate::storage::{content_hash, DocumentRecord, JobRecord};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite content store backend
pub struct SqliteContentStore {
    conn: Connection,
}

impl std::fmt::Debug for SqliteContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteContentStore").finish_non_exhaustive()
    }
}

impl SqliteContentStore {
    /// Opens or creates the database at the given path
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn job_from_row(row: &Row<'_>) -> rusqlite::Result<(JobRecord, String)> {
        let status: String = row.get(2)?;
        Ok((
            JobRecord {
                id: row.get(0)?,
                url: row.get(1)?,
                status: JobState::Scraping,
                submitted_at: row.get(3)?,
                updated_at: row.get(4)?,
            },
            status,
        ))
    }
}

impl ContentStore for SqliteContentStore {
    // ===== Job Management =====

    fn record_job(&mut self, job: &JobHandle, url: &str, status: JobState) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO jobs (id, url, status, submitted_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(id) DO UPDATE SET url = excluded.url, status = excluded.status,
                 updated_at = excluded.updated_at",
            params![job.id(), url, status.as_str(), now],
        )?;
        Ok(())
    }

    fn update_job_status(&mut self, job: &JobHandle, status: JobState) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now, job.id()],
        )?;

        if updated == 0 {
            return Err(StorageError::JobNotFound(job.id().to_string()));
        }
        Ok(())
    }

    fn get_job(&self, job_id: &str) -> StorageResult<Option<JobRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, url, status, submitted_at, updated_at FROM jobs WHERE id = ?1",
                params![job_id],
                Self::job_from_row,
            )
            .optional()?;

        match row {
            Some((mut record, status)) => {
                record.status = JobState::from_api_str(&status).ok_or_else(|| {
                    StorageError::Serialization(format!(
                        "Unknown job status '{}' for job {}",
                        status, job_id
                    ))
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    // ===== Document Management =====

    fn insert_record(&mut self, job: &JobHandle, document: &Document) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let body = serde_json::to_string(document)?;
        self.conn.execute(
            "INSERT INTO documents (job_id, source_url, content_hash, body, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                job.id(),
                document.source_url(),
                content_hash(document),
                body,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn insert_records(&mut self, job: &JobHandle, documents: &[Document]) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO documents (job_id, source_url, content_hash, body, stored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for document in documents {
                let body = serde_json::to_string(document)?;
                stmt.execute(params![
                    job.id(),
                    document.source_url(),
                    content_hash(document),
                    body,
                    now
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(job = %job, count = documents.len(), "Stored documents");
        Ok(documents.len())
    }

    fn records_for_job(&self, job_id: &str) -> StorageResult<Vec<DocumentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, job_id, source_url, content_hash, body, stored_at
             FROM documents WHERE job_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![job_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, job_id, source_url, content_hash, body, stored_at) = row?;
            records.push(DocumentRecord {
                id,
                job_id,
                source_url,
                content_hash,
                document: serde_json::from_str(&body)?,
                stored_at,
            });
        }
        Ok(records)
    }

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
