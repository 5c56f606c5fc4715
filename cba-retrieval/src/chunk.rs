//! Chunk types and builders
//!
//! A chunk is the unit of retrieval: a bounded span of text from one source
//! document plus its provenance.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum characters kept from a chunk's source text
pub const MAX_CHUNK_CHARS: usize = 2000;

/// A retrievable span of document text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source document identifier
    pub doc_id: String,
    /// Originating source record (equals `doc_id` when untracked)
    pub source_id: String,
    /// Unique within one index build
    pub chunk_id: String,
    /// Chunk body, never empty
    pub text: String,
    #[serde(default)]
    pub page_start: Option<u32>,
    #[serde(default)]
    pub page_end: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl Chunk {
    /// Create a new builder for Chunk
    pub fn builder() -> ChunkBuilder {
        ChunkBuilder::new()
    }
}

/// Truncate to at most `max` characters on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Builder for Chunk with fluent API
#[derive(Debug, Default)]
pub struct ChunkBuilder {
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

impl ChunkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source document ID
    pub fn doc_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    /// Set the source record ID (defaults to the document ID)
    pub fn source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Set the chunk ID (a UUID is generated if not set)
    pub fn chunk_id(mut self, chunk_id: impl Into<String>) -> Self {
        self.chunk_id = Some(chunk_id.into());
        self
    }

    /// Set the text; trimmed and truncated at build time
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the page range
    pub fn pages(mut self, start: u32, end: u32) -> Self {
        self.page_start = Some(start);
        self.page_end = Some(end);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn project_type(mut self, project_type: impl Into<String>) -> Self {
        self.project_type = Some(project_type.into());
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Build the Chunk
    pub fn build(self) -> Result<Chunk, ChunkBuilderError> {
        let doc_id = self
            .doc_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ChunkBuilderError::MissingDocId)?;
        let text = self.text.ok_or(ChunkBuilderError::EmptyText)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ChunkBuilderError::EmptyText);
        }

        Ok(Chunk {
            source_id: self.source_id.unwrap_or_else(|| doc_id.clone()),
            doc_id,
            chunk_id: self
                .chunk_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            text: truncate_chars(text, MAX_CHUNK_CHARS).to_string(),
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

/// Errors that can occur when building a Chunk
#[derive(Debug, thiserror::Error)]
pub enum ChunkBuilderError {
    #[error("Missing required field: doc_id")]
    MissingDocId,
    #[error("Chunk text is empty")]
    EmptyText,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_source_to_doc() {
        let chunk = Chunk::builder()
            .doc_id("oakland-2019")
            .text("Local hiring requirements shall apply.")
            .build()
            .unwrap();

        assert_eq!(chunk.source_id, "oakland-2019");
        assert!(chunk.page_start.is_none());
        assert!(chunk.title.is_none());
        assert!(Uuid::parse_str(&chunk.chunk_id).is_ok());
    }

    #[test]
    fn test_chunk_ids_unique() {
        let a = Chunk::builder().doc_id("d").text("x").build().unwrap();
        let b = Chunk::builder().doc_id("d").text("x").build().unwrap();
        assert_ne!(a.chunk_id, b.chunk_id);
    }

    #[test]
    fn test_builder_truncates_by_chars() {
        let long = "é".repeat(MAX_CHUNK_CHARS + 50);
        let chunk = Chunk::builder().doc_id("d").text(long).build().unwrap();
        assert_eq!(chunk.text.chars().count(), MAX_CHUNK_CHARS);
    }

    #[test]
    fn test_builder_rejects_blank_text() {
        let result = Chunk::builder().doc_id("d").text("   \n\t ").build();
        assert!(matches!(result, Err(ChunkBuilderError::EmptyText)));
    }

    #[test]
    fn test_builder_missing_doc_id() {
        let result = Chunk::builder().text("content").build();
        assert!(matches!(result, Err(ChunkBuilderError::MissingDocId)));
    }

    #[test]
    fn test_absent_fields_round_trip_as_absent() {
        let chunk = Chunk::builder()
            .doc_id("d")
            .text("parking minimums are reduced")
            .title("d.txt")
            .build()
            .unwrap();

        let json = serde_json::to_string(&chunk).unwrap();
        assert!(json.contains("\"page_start\":null"));

        let back: Chunk = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chunk);
        assert_eq!(back.page_start, None);
        assert_eq!(back.state, None);
    }

    #[test]
    fn test_missing_optional_keys_deserialize_as_none() {
        let json = r#"{"doc_id":"a","source_id":"a","chunk_id":"c1","text":"t"}"#;
        let chunk: Chunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.page_end, None);
        assert_eq!(chunk.year, None);
    }

    #[test]
    fn test_truncate_chars_short_input() {
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
    }
}
