//! Embedding module for semantic search
//!
//! Text is embedded by a hosted model behind the [`Embedder`] trait;
//! [`VectorEngine`] adds batching and dimension checks on top.

mod engine;
mod openai;

pub use engine::{VectorEngine, DEFAULT_BATCH_SIZE};
pub use openai::OpenAiEmbedder;
pub(crate) use openai::{auth_headers, classify_status, classify_transport};

use crate::error::Result;

/// A text embedding provider
///
/// `embed` must return exactly one vector per input, in input order.
pub trait Embedder: Send + Sync {
    /// Model identifier used for every call
    fn model(&self) -> &str;

    /// Embed a batch of texts
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}
