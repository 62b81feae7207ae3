//! Data types for documents, segments, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Metadata key holding the path of the file a document came from.
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding the 0-based page index within the source file.
pub const PAGE_KEY: &str = "page";
/// Metadata key holding the position of a segment within its document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// Extracted text of one PDF page plus where it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document (`<source>#<page>`).
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata, at least `source` and `page`.
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// The file path this document was loaded from.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// A bounded slice of a [`Document`]'s text, the unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    /// Unique identifier for the segment (`<document_id>_<chunk_index>`).
    pub id: String,
    /// The text content of the segment.
    pub text: String,
    /// Metadata inherited from the parent document plus `chunk_index`.
    pub metadata: HashMap<String, String>,
    /// The ID of the parent [`Document`].
    pub document_id: String,
}

impl Segment {
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// A retrieved [`Segment`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved segment.
    pub segment: Segment,
    /// The cosine similarity score (higher is more relevant).
    pub score: f32,
}
