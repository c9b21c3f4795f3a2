//! JSON-lines import and export of documents

use crate::job::Document;
use crate::storage::{StorageError, StorageResult};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Reads one document per non-blank line
pub fn read_lines(path: &Path) -> StorageResult<Vec<Document>> {
    let reader = BufReader::new(File::open(path)?);
    let mut documents = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let document = serde_json::from_str(&line).map_err(|e| {
            StorageError::Serialization(format!("{}:{}: {}", path.display(), index + 1, e))
        })?;
        documents.push(document);
    }

    Ok(documents)
}

/// Writes one document per line
pub fn write_lines(path: &Path, documents: &[Document]) -> StorageResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for document in documents {
        serde_json::to_writer(&mut writer, document)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
