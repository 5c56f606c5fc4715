//! Error types for cba-retrieval

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of a failed call to a hosted model API
///
/// Lets callers tell a rejected request (bad input, credentials, quota)
/// apart from a provider outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceFailure {
    /// Connection failed or timed out before a response arrived
    Unreachable,
    /// Provider answered with a 4xx status (bad request, auth, quota)
    Rejected,
    /// Provider answered with a 5xx status
    Upstream,
    /// Response arrived but could not be used
    Malformed,
}

impl fmt::Display for ServiceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unreachable => "unreachable",
            Self::Rejected => "request rejected",
            Self::Upstream => "provider error",
            Self::Malformed => "malformed response",
        };
        f.write_str(label)
    }
}

/// Errors that can occur in the retrieval system
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Embedding provider failed
    #[error("Embedding service {kind}: {message}")]
    EmbeddingService {
        kind: ServiceFailure,
        message: String,
    },

    /// Text-completion provider failed
    #[error("Completion service {kind}: {message}")]
    Completion {
        kind: ServiceFailure,
        message: String,
    },

    /// No published vector index
    #[error("Vector index not found at {}. Run `cba build` first.", .0.display())]
    IndexNotFound(PathBuf),

    /// Vector index exists but its metadata file does not
    #[error("Index metadata not found at {}. Run `cba build` to rebuild the index.", .0.display())]
    MetadataNotFound(PathBuf),

    /// Chunk store file missing
    #[error("Chunk store not found at {}. Run `cba ingest` first.", .0.display())]
    ChunksNotFound(PathBuf),

    /// Index build attempted over an empty corpus
    #[error("No chunks to index")]
    NoChunks,

    /// Chunk record rejected during load
    #[error("Malformed chunk at line {line}: {reason}")]
    MalformedChunk { line: usize, reason: String },

    /// Two chunks in one build share an identifier
    #[error("Duplicate chunk_id in corpus: {0}")]
    DuplicateChunkId(String),

    /// Query text was empty or whitespace
    #[error("Query must not be empty")]
    EmptyQuery,

    /// Embedding dimensionality differs from what was expected
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Index and metadata disagree on record count
    #[error("Index holds {vectors} vectors but metadata holds {records} records. Run `cba build` to rebuild.")]
    ArtifactMismatch { vectors: usize, records: usize },

    /// Persisted artifact could not be decoded
    #[error("Corrupt artifact {}: {reason}", .path.display())]
    CorruptArtifact { path: PathBuf, reason: String },

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Builder error
    #[error("Builder error: {0}")]
    Builder(#[from] crate::chunk::ChunkBuilderError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Serialization error (bincode)
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetrievalError {
    /// Create an embedding service error
    pub fn embedding(kind: ServiceFailure, msg: impl Into<String>) -> Self {
        Self::EmbeddingService {
            kind,
            message: msg.into(),
        }
    }

    /// Create a completion service error
    pub fn completion(kind: ServiceFailure, msg: impl Into<String>) -> Self {
        Self::Completion {
            kind,
            message: msg.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a corrupt artifact error
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True when the caller can recover by running the build step
    pub fn needs_build(&self) -> bool {
        matches!(
            self,
            Self::IndexNotFound(_) | Self::MetadataNotFound(_) | Self::ArtifactMismatch { .. }
        )
    }
}

/// Result type for retrieval operations
pub type Result<T> = std::result::Result<T, RetrievalError>;
