//! Index metadata file
//!
//! Line `i` holds the full chunk for vector ordinal `i`. Unlike the chunk
//! store, this artifact is read strictly: any bad line fails the load.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::chunk::Chunk;
use crate::chunk_store::write_jsonl;
use crate::error::{Result, RetrievalError};

/// Write chunks in ordinal order
pub fn write_metadata(path: &Path, chunks: &[Chunk]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_jsonl(&mut writer, chunks)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Read every record in ordinal order
pub fn load_metadata(path: &Path) -> Result<Vec<Chunk>> {
    if !path.is_file() {
        return Err(RetrievalError::MetadataNotFound(path.to_path_buf()));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let chunk: Chunk = serde_json::from_str(&line)
            .map_err(|e| RetrievalError::corrupt(path, format!("line {}: {}", idx + 1, e)))?;
        records.push(chunk);
    }
    Ok(records)
}
