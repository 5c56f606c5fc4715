//! Vector embedding engine
//!
//! High-level API over an [`Embedder`]: bounded batching, order preservation,
//! a pinned dimensionality and an optional cache.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::Embedder;
use crate::error::{Result, RetrievalError};

/// Default number of texts sent per provider call
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Vector embedding engine
///
/// The first successful call fixes the embedding dimensionality for the
/// lifetime of the engine. Later calls that disagree fail with
/// [`RetrievalError::DimensionMismatch`].
pub struct VectorEngine {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    dimension: Mutex<Option<usize>>,
    cache: Option<DashMap<String, Vec<f32>>>,
}

impl VectorEngine {
    /// Create a VectorEngine over an embedding provider
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            dimension: Mutex::new(None),
            cache: None,
        }
    }

    /// Set the maximum texts per provider call
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Keep embeddings in memory, keyed by text
    pub fn with_cache(mut self) -> Self {
        self.cache = Some(DashMap::new());
        self
    }

    /// Model identifier of the underlying provider
    pub fn model(&self) -> &str {
        self.embedder.model()
    }

    /// Dimensionality seen so far, if any call has succeeded
    pub fn dimension(&self) -> Option<usize> {
        *self.dimension.lock()
    }

    /// Embed a single text
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text])?;
        vectors
            .pop()
            .ok_or_else(|| RetrievalError::config("embedder returned no vector"))
    }

    /// Embed texts in bounded batches, preserving input order
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<Option<Vec<f32>>> = match &self.cache {
            Some(cache) => texts
                .iter()
                .map(|text| cache.get(*text).map(|v| v.clone()))
                .collect(),
            None => vec![None; texts.len()],
        };

        let uncached: Vec<(usize, &str)> = results
            .iter()
            .enumerate()
            .filter(|(_, cached)| cached.is_none())
            .map(|(i, _)| (i, texts[i]))
            .collect();

        for batch in uncached.chunks(self.batch_size) {
            let batch_texts: Vec<&str> = batch.iter().map(|(_, t)| *t).collect();
            log::debug!(
                "Embedding batch of {} texts with {}",
                batch_texts.len(),
                self.model()
            );
            let vectors = self.embedder.embed(&batch_texts)?;
            self.check_batch(batch_texts.len(), &vectors)?;

            for ((idx, text), vector) in batch.iter().zip(vectors) {
                if let Some(cache) = &self.cache {
                    cache.insert(text.to_string(), vector.clone());
                }
                results[*idx] = Some(vector);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn check_batch(&self, expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.len() != expected {
            return Err(RetrievalError::embedding(
                crate::error::ServiceFailure::Malformed,
                format!(
                    "embedder returned {} vectors for {} inputs",
                    vectors.len(),
                    expected
                ),
            ));
        }

        let mut pinned = self.dimension.lock();
        for vector in vectors {
            match *pinned {
                Some(dim) if dim != vector.len() => {
                    return Err(RetrievalError::DimensionMismatch {
                        expected: dim,
                        actual: vector.len(),
                    });
                }
                Some(_) => {}
                None => {
                    log::info!("VectorEngine ready ({}d, {})", vector.len(), self.model());
                    *pinned = Some(vector.len());
                }
            }
        }
        Ok(())
    }

    /// Get cache size
    pub fn cache_size(&self) -> usize {
        self.cache.as_ref().map_or(0, |c| c.len())
    }

    /// Clear the cache
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }
}
