//! Vector search engine
//!
//! Embeds a query, runs k-NN over the published index and joins each
//! neighbor back to its chunk by ordinal.

use std::sync::Arc;

use serde::Serialize;

use crate::artifacts::{ArtifactLayout, Generation};
use crate::chunk::Chunk;
use crate::embedding::VectorEngine;
use crate::error::{Result, RetrievalError};
use crate::index::{FlatL2Index, VectorIndex};
use crate::metadata::load_metadata;

/// Largest `top_k` accepted from callers at the API/CLI boundary
pub const MAX_TOP_K: usize = 50;

/// Check a caller-supplied `top_k` against `[1, MAX_TOP_K]`
pub fn validate_top_k(top_k: usize) -> Result<usize> {
    if (1..=MAX_TOP_K).contains(&top_k) {
        Ok(top_k)
    } else {
        Err(RetrievalError::config(format!(
            "top_k must be between 1 and {}, got {}",
            MAX_TOP_K, top_k
        )))
    }
}

/// One ranked match
///
/// Serializes flat: `rank`, `score` and then every chunk field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// 1-based position in the result list
    pub rank: usize,
    /// Squared L2 distance; lower is closer
    pub score: f32,
    #[serde(flatten)]
    pub chunk: Chunk,
}

pub struct SearchEngine {
    engine: Arc<VectorEngine>,
    layout: ArtifactLayout,
}

impl SearchEngine {
    pub fn new(engine: Arc<VectorEngine>, layout: ArtifactLayout) -> Self {
        Self { engine, layout }
    }

    /// Return up to `top_k` chunks closest to `query`, nearest first
    ///
    /// Artifacts are resolved and loaded on every call, so a build that
    /// publishes between two searches is picked up by the second.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let (generation, index, metadata) = self.load_current()?;

        let query_vector = self.engine.embed(query)?;
        if query_vector.len() != index.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                expected: index.dimension(),
                actual: query_vector.len(),
            });
        }

        // Slots past the index size only ever hold sentinels.
        let k = top_k.min(MAX_TOP_K.max(index.len()));
        let neighbors = index.search(&query_vector, k)?;

        let results: Vec<SearchResult> = neighbors
            .matches()
            .filter_map(|(ordinal, distance)| {
                metadata.get(ordinal).map(|chunk| (distance, chunk.clone()))
            })
            .enumerate()
            .map(|(pos, (score, chunk))| SearchResult {
                rank: pos + 1,
                score,
                chunk,
            })
            .collect();

        log::debug!(
            "Query matched {} of {} chunks in {}",
            results.len(),
            index.len(),
            generation.name
        );
        Ok(results)
    }

    /// Load the published pair, re-resolving once if it was pruned mid-read
    fn load_current(&self) -> Result<(Generation, FlatL2Index, Vec<Chunk>)> {
        let generation = self.layout.resolve()?;
        match load_pair(&generation) {
            Err(e @ (RetrievalError::IndexNotFound(_) | RetrievalError::MetadataNotFound(_))) => {
                let latest = self.layout.resolve()?;
                if latest.name == generation.name {
                    return Err(e);
                }
                log::debug!(
                    "Generation {} replaced during load, retrying with {}",
                    generation.name,
                    latest.name
                );
                let (index, metadata) = load_pair(&latest)?;
                Ok((latest, index, metadata))
            }
            other => other.map(|(index, metadata)| (generation, index, metadata)),
        }
    }
}

fn load_pair(generation: &Generation) -> Result<(FlatL2Index, Vec<Chunk>)> {
    let index = FlatL2Index::load(&generation.index_path())?;
    let metadata = load_metadata(&generation.metadata_path())?;
    if index.len() != metadata.len() {
        return Err(RetrievalError::ArtifactMismatch {
            vectors: index.len(),
            records: metadata.len(),
        });
    }
    Ok((index, metadata))
}
