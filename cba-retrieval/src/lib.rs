//! CBA Retrieval
//!
//! Semantic retrieval over a corpus of Community Benefits Agreement text.
//!
//! ## Features
//!
//! - **Chunk store** - JSONL corpus of text chunks with provenance
//! - **Hosted embeddings** - OpenAI-compatible embeddings behind the [`Embedder`] trait
//! - **Flat L2 index** - Exact nearest-neighbor search with ordinal-aligned metadata
//! - **Atomic publication** - Readers never see an index from one build and metadata from another
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cba_retrieval::{ArtifactLayout, ChunkStore, IndexBuilder, RetrievalConfig, SearchEngine};
//!
//! let mut config = RetrievalConfig::default();
//! config.embedding.api_key = Some(std::env::var("OPENAI_API_KEY")?);
//! let engine = Arc::new(config.vector_engine()?);
//! let layout = ArtifactLayout::new(&config.index_dir);
//!
//! IndexBuilder::new(engine.clone(), layout.clone())
//!     .build_from_store(&ChunkStore::new(&config.chunks_file))?;
//!
//! let results = SearchEngine::new(engine, layout).search("local hiring commitments", 5)?;
//! for hit in results {
//!     println!("{} {:.3} {}", hit.rank, hit.score, hit.chunk.doc_id);
//! }
//! ```

pub mod answer;
pub mod artifacts;
pub mod builder;
pub mod chunk;
pub mod chunk_store;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod metadata;
pub mod search;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use answer::AnswerClient;
pub use artifacts::{ArtifactLayout, Generation};
pub use builder::{BuildReport, IndexBuilder};
pub use chunk::{Chunk, ChunkBuilder, ChunkBuilderError};
pub use chunk_store::{ChunkLoad, ChunkStore};
pub use config::{AnswerConfig, EmbeddingConfig, RetrievalConfig};
pub use embedding::{Embedder, OpenAiEmbedder, VectorEngine};
pub use error::{Result, RetrievalError, ServiceFailure};
pub use index::{FlatL2Index, Neighbors, VectorIndex};
pub use ingest::{ingest_directory, IngestReport};
pub use search::{validate_top_k, SearchEngine, SearchResult, MAX_TOP_K};
