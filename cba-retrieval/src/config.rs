//! Retrieval configuration
//!
//! Explicit configuration objects handed to clients and engines at
//! construction time. Library callers start from `Default`; the CLI fills
//! every field from its arguments.

use std::path::PathBuf;
use std::time::Duration;

use crate::embedding::VectorEngine;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_ANSWER_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHUNKS_FILE: &str = "data/chunks/chunks.jsonl";
pub const DEFAULT_INDEX_DIR: &str = "data/index";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ANSWER_TIMEOUT_SECS: u64 = 60;

/// Settings for the hosted embedding model
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Dimension override, for models that support one
    pub dimensions: Option<usize>,
    pub timeout: Duration,
    /// Total attempts per request; 1 disables retries
    pub max_attempts: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_attempts: 1,
            batch_size: crate::embedding::DEFAULT_BATCH_SIZE,
        }
    }
}

/// Settings for the hosted text-completion model
#[derive(Debug, Clone)]
pub struct AnswerConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_ANSWER_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_ANSWER_TIMEOUT_SECS),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub chunks_file: PathBuf,
    pub index_dir: PathBuf,
    pub embedding: EmbeddingConfig,
    pub answer: AnswerConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunks_file: PathBuf::from(DEFAULT_CHUNKS_FILE),
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            embedding: EmbeddingConfig::default(),
            answer: AnswerConfig::default(),
        }
    }
}

impl RetrievalConfig {
    /// Build a VectorEngine backed by the hosted embedding model
    pub fn vector_engine(&self) -> crate::error::Result<VectorEngine> {
        let embedder = crate::embedding::OpenAiEmbedder::new(&self.embedding)?;
        Ok(VectorEngine::new(std::sync::Arc::new(embedder))
            .with_batch_size(self.embedding.batch_size))
    }
}
