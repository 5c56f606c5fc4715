//! Line-delimited chunk store
//!
//! One JSON chunk per line, UTF-8, newline-terminated. Produced by ingestion
//! and read wholesale by the index builder.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::chunk::Chunk;
use crate::error::{Result, RetrievalError};

/// Chunks read from a store plus the records that were skipped
#[derive(Debug, Default)]
pub struct ChunkLoad {
    pub chunks: Vec<Chunk>,
    pub skipped: usize,
}

/// Permissive view of a stored record, validated before it becomes a Chunk
#[derive(Deserialize)]
struct StoredChunk {
    doc_id: Option<String>,
    source_id: Option<String>,
    chunk_id: Option<String>,
    text: Option<String>,
    page_start: Option<u32>,
    page_end: Option<u32>,
    title: Option<String>,
    state: Option<String>,
    city: Option<String>,
    project_type: Option<String>,
    year: Option<i32>,
}

impl StoredChunk {
    fn validate(self, line: usize) -> Result<Chunk> {
        let required = |value: Option<String>, field: &str| {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| RetrievalError::MalformedChunk {
                    line,
                    reason: format!("missing {}", field),
                })
        };

        Ok(Chunk {
            doc_id: required(self.doc_id, "doc_id")?,
            source_id: required(self.source_id, "source_id")?,
            chunk_id: required(self.chunk_id, "chunk_id")?,
            text: required(self.text, "text")?,
            page_start: self.page_start,
            page_end: self.page_end,
            title: self.title,
            state: self.state,
            city: self.city,
            project_type: self.project_type,
            year: self.year,
        })
    }
}

/// JSONL-backed chunk collection
#[derive(Debug, Clone)]
pub struct ChunkStore {
    path: PathBuf,
}

impl ChunkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load every valid chunk in file order
    ///
    /// Records that fail to parse, lack a required identifier or repeat an
    /// earlier `chunk_id` are logged and skipped.
    pub fn load(&self) -> Result<ChunkLoad> {
        if !self.exists() {
            return Err(RetrievalError::ChunksNotFound(self.path.clone()));
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut load = ChunkLoad::default();
        let mut seen = HashSet::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let line_no = idx + 1;

            let parsed = serde_json::from_str::<StoredChunk>(&line)
                .map_err(|e| RetrievalError::MalformedChunk {
                    line: line_no,
                    reason: e.to_string(),
                })
                .and_then(|raw| raw.validate(line_no))
                .and_then(|chunk| {
                    if seen.insert(chunk.chunk_id.clone()) {
                        Ok(chunk)
                    } else {
                        Err(RetrievalError::MalformedChunk {
                            line: line_no,
                            reason: format!("duplicate chunk_id {}", chunk.chunk_id),
                        })
                    }
                });

            match parsed {
                Ok(chunk) => load.chunks.push(chunk),
                Err(e) => {
                    log::warn!("{}: {}. Skipping.", self.path.display(), e);
                    load.skipped += 1;
                }
            }
        }

        log::info!(
            "Loaded {} chunks from {}",
            load.chunks.len(),
            self.path.display()
        );
        if load.skipped > 0 {
            log::warn!("Skipped {} malformed chunk records", load.skipped);
        }

        Ok(load)
    }

    /// Replace the store contents with `chunks`
    pub fn write_all(&self, chunks: &[Chunk]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            write_jsonl(&mut writer, chunks)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Append a single chunk to the end of the store
    pub fn append(&self, chunk: &Chunk) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        write_jsonl(&mut writer, std::slice::from_ref(chunk))?;
        writer.flush()?;
        Ok(())
    }
}

/// Write chunks as newline-terminated JSON lines
pub(crate) fn write_jsonl<W: Write>(writer: &mut W, chunks: &[Chunk]) -> Result<()> {
    for chunk in chunks {
        serde_json::to_writer(&mut *writer, chunk)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chunk(doc: &str, text: &str) -> Chunk {
        Chunk::builder().doc_id(doc).text(text).build().unwrap()
    }

    #[test]
    fn test_write_then_load_preserves_order() {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path().join("chunks").join("chunks.jsonl"));
        let chunks = vec![chunk("b", "second"), chunk("a", "first"), chunk("c", "third")];

        store.write_all(&chunks).unwrap();
        let load = store.load().unwrap();

        assert_eq!(load.chunks, chunks);
        assert_eq!(load.skipped, 0);
    }

    #[test]
    fn test_missing_store_is_chunks_not_found() {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path().join("nope.jsonl"));
        assert!(matches!(
            store.load(),
            Err(RetrievalError::ChunksNotFound(_))
        ));
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chunks.jsonl");
        let contents = [
            r#"{"doc_id":"a","source_id":"a","chunk_id":"1","text":"kept"}"#,
            r#"{"source_id":"b","chunk_id":"2","text":"no doc id"}"#,
            r#"not json at all"#,
            "",
            r#"{"doc_id":"c","source_id":"c","chunk_id":"","text":"blank id"}"#,
            r#"{"doc_id":"d","source_id":"d","chunk_id":"4","text":"also kept","page_start":3}"#,
            r#"{"doc_id":"e","source_id":"e","chunk_id":"4","text":"duplicate id"}"#,
        ]
        .join("\n");
        fs::write(&path, contents).unwrap();

        let load = ChunkStore::new(&path).load().unwrap();
        assert_eq!(load.skipped, 4);
        let ids: Vec<_> = load.chunks.iter().map(|c| c.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
        assert_eq!(load.chunks[1].page_start, Some(3));
        assert_eq!(load.chunks[0].page_start, None);
    }

    #[test]
    fn test_append_extends_store() {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path().join("chunks.jsonl"));
        store.append(&chunk("a", "one")).unwrap();
        store.append(&chunk("b", "two")).unwrap();

        let load = store.load().unwrap();
        assert_eq!(load.chunks.len(), 2);
        assert_eq!(load.chunks[1].doc_id, "b");
    }
}
