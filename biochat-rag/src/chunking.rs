//! Document chunking.
//!
//! [`RecursiveChunker`] splits text on the coarsest separator that occurs in
//! it (`"\n\n"`, then `"\n"`, then `" "`, then single characters), merges the
//! pieces back into segments of at most `chunk_size` characters, and carries
//! up to `chunk_overlap` characters of trailing pieces into the next segment.
//! Lengths are counted in `char`s, so multi-byte text never splits inside a
//! UTF-8 sequence.

use std::collections::VecDeque;

use crate::document::{CHUNK_INDEX_KEY, Document, Segment};

/// A strategy for splitting documents into segments.
pub trait Chunker: Send + Sync {
    /// Split a document into segments.
    ///
    /// Returns an empty `Vec` if the document has no non-whitespace text.
    fn chunk(&self, document: &Document) -> Vec<Segment>;
}

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Recursive character splitter with overlap.
///
/// Segment IDs are generated as `{document_id}_{chunk_index}`. Each segment
/// inherits the parent document's metadata plus a `chunk_index` field.
///
/// # Example
///
/// ```rust,ignore
/// use biochat_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(1000, 100);
/// let segments = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per segment
    /// * `chunk_overlap`: maximum number of characters shared by consecutive segments
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }

    /// Split raw text into trimmed, non-empty pieces of at most `chunk_size` characters.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &DEFAULT_SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = candidate;
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }

        chunks
    }

    /// Greedily join pieces up to `chunk_size`, keeping a tail of at most
    /// `chunk_overlap` characters as the start of the next chunk.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window);
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    let Some(first) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(first);
                }
            }
            window.push_back(piece);
            total += len;
        }

        push_joined(&mut chunks, &window);
        chunks
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split at every occurrence of `separator`, attaching the separator to the
/// start of the following piece. An empty separator splits into characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(separator) {
        if pos > start {
            pieces.push(&text[start..pos]);
            start = pos;
        }
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Segment> {
        if document.text.trim().is_empty() {
            return Vec::new();
        }

        self.split_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let mut metadata = document.metadata.clone();
                metadata.insert(CHUNK_INDEX_KEY.to_string(), i.to_string());
                Segment {
                    id: format!("{}_{i}", document.id),
                    text,
                    metadata,
                    document_id: document.id.clone(),
                }
            })
            .collect()
    }
}
