//! Vector index builder
//!
//! Embeds every chunk in the store and publishes a new generation holding
//! the flat index and its ordinal-aligned metadata.

use std::collections::HashSet;
use std::sync::Arc;

use crate::artifacts::ArtifactLayout;
use crate::chunk::Chunk;
use crate::chunk_store::ChunkStore;
use crate::embedding::VectorEngine;
use crate::error::{Result, RetrievalError};
use crate::index::{FlatL2Index, VectorIndex};
use crate::metadata::write_metadata;

/// Summary of a completed build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub chunk_count: usize,
    pub dimension: usize,
    /// Name of the published generation
    pub generation: String,
    pub model: String,
}

pub struct IndexBuilder {
    engine: Arc<VectorEngine>,
    layout: ArtifactLayout,
}

impl IndexBuilder {
    pub fn new(engine: Arc<VectorEngine>, layout: ArtifactLayout) -> Self {
        Self { engine, layout }
    }

    /// Build from every valid record in `store`, in file order
    pub fn build_from_store(&self, store: &ChunkStore) -> Result<BuildReport> {
        let load = store.load()?;
        self.build(&load.chunks)
    }

    /// Embed `chunks` and publish them as the current index
    ///
    /// Nothing is written when `chunks` is empty or embedding fails; the
    /// previously published generation stays current.
    pub fn build(&self, chunks: &[Chunk]) -> Result<BuildReport> {
        if chunks.is_empty() {
            return Err(RetrievalError::NoChunks);
        }

        let mut seen = HashSet::with_capacity(chunks.len());
        for chunk in chunks {
            if !seen.insert(chunk.chunk_id.as_str()) {
                return Err(RetrievalError::DuplicateChunkId(chunk.chunk_id.clone()));
            }
        }

        log::info!(
            "Embedding {} chunks with {}",
            chunks.len(),
            self.engine.model()
        );
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.engine.embed_batch(&texts)?;

        let index = FlatL2Index::from_vectors(vectors)?;
        if index.len() != chunks.len() {
            return Err(RetrievalError::ArtifactMismatch {
                vectors: index.len(),
                records: chunks.len(),
            });
        }

        let staged = self.layout.stage()?;
        index.save(&staged.index_path())?;
        write_metadata(&staged.metadata_path(), chunks)?;
        let generation = self.layout.publish(staged)?;

        log::info!(
            "Indexed {} chunks ({}d) into {}",
            index.len(),
            index.dimension(),
            generation.dir.display()
        );

        Ok(BuildReport {
            chunk_count: index.len(),
            dimension: index.dimension(),
            generation: generation.name,
            model: self.engine.model().to_string(),
        })
    }
}
