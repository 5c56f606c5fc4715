//! Chunk creation from extracted document text
//!
//! Turns a directory of `*.txt` files (one per source document, produced by
//! an external text-extraction step) into a chunk store.

use std::path::{Path, PathBuf};

use crate::chunk::{Chunk, ChunkBuilderError};
use crate::chunk_store::ChunkStore;
use crate::error::{Result, RetrievalError};

/// Outcome of an ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_seen: usize,
    pub chunks_written: usize,
    pub files_skipped: usize,
}

/// List `*.txt` files directly under `dir`, sorted by path
pub fn find_text_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("*.txt");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| RetrievalError::config("Invalid UTF-8 in input directory"))?;

    let entries = glob::glob(pattern)
        .map_err(|e| RetrievalError::config(format!("Bad input pattern: {}", e)))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => log::warn!("Unreadable entry under {}: {}", dir.display(), e),
        }
    }
    files.sort();
    Ok(files)
}

/// Build one chunk from a document's extracted text
///
/// Fails with `EmptyText` when the text is blank after trimming and with
/// `MissingDocId` when the file stem is blank.
pub fn chunk_from_text(
    path: &Path,
    text: &str,
) -> std::result::Result<Chunk, ChunkBuilderError> {
    let doc_id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or(ChunkBuilderError::MissingDocId)?;
    let mut builder = Chunk::builder().doc_id(doc_id).text(text);
    if let Some(name) = path.file_name() {
        builder = builder.title(name.to_string_lossy());
    }
    builder.build()
}

/// Chunk every text file under `input_dir` into `store`, replacing its contents
pub fn ingest_directory(input_dir: &Path, store: &ChunkStore) -> Result<IngestReport> {
    if !input_dir.is_dir() {
        return Err(RetrievalError::config(format!(
            "Input directory not found: {}",
            input_dir.display()
        )));
    }

    let files = find_text_files(input_dir)?;
    log::info!(
        "Found {} .txt files in {}",
        files.len(),
        input_dir.display()
    );

    let mut report = IngestReport {
        files_seen: files.len(),
        ..Default::default()
    };
    let mut chunks = Vec::with_capacity(files.len());

    for path in &files {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes);
        match chunk_from_text(path, &text) {
            Ok(chunk) => chunks.push(chunk),
            Err(ChunkBuilderError::EmptyText) => {
                log::debug!("Skipping empty document {}", path.display());
                report.files_skipped += 1;
            }
            Err(ChunkBuilderError::MissingDocId) => {
                log::warn!(
                    "Skipping {}: file name gives no document id",
                    path.display()
                );
                report.files_skipped += 1;
            }
        }
    }

    store.write_all(&chunks)?;
    report.chunks_written = chunks.len();

    log::info!(
        "Wrote {} chunks to {}",
        report.chunks_written,
        store.path().display()
    );
    Ok(report)
}
