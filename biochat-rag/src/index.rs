//! Exact in-memory vector index over embedded segments, plus on-disk persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::{SearchResult, Segment};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::input::SourceMode;

/// A segment together with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub embedding: Vec<f32>,
    pub segment: Segment,
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Brute-force cosine index. Every entry has the same dimensionality.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Assemble an index from already embedded entries.
    pub fn from_entries(dimensions: usize, entries: Vec<IndexEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(RagError::VectorIndexError("cannot build an index from zero segments".into()));
        }
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimensions) {
            return Err(RagError::VectorIndexError(format!(
                "segment '{}' has {} dimensions, expected {dimensions}",
                bad.segment.id,
                bad.embedding.len()
            )));
        }
        Ok(Self { dimensions, entries })
    }

    /// Embed every segment and index the results.
    pub async fn build(segments: Vec<Segment>, embedder: &dyn EmbeddingProvider) -> Result<Self> {
        if segments.is_empty() {
            return Err(RagError::VectorIndexError("cannot build an index from zero segments".into()));
        }

        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;
        if embeddings.len() != segments.len() {
            return Err(RagError::EmbeddingError {
                provider: embedder.name().to_string(),
                message: format!(
                    "expected {} embeddings, got {}",
                    segments.len(),
                    embeddings.len()
                ),
            });
        }

        let dimensions = embeddings.first().map_or(embedder.dimensions(), Vec::len);
        let entries = embeddings
            .into_iter()
            .zip(segments)
            .map(|(embedding, segment)| IndexEntry { embedding, segment })
            .collect();

        let index = Self::from_entries(dimensions, entries)?;
        info!(entries = index.len(), dimensions, "built vector index");
        Ok(index)
    }

    /// The `k` entries most similar to `query`, best first.
    ///
    /// Equal scores keep insertion order. Returns fewer than `k` results when
    /// the index is smaller.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimensions {
            return Err(RagError::VectorIndexError(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query, &entry.embedding)))
            .collect();
        // Stable sort: ties stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchResult { segment: self.entries[i].segment.clone(), score })
            .collect())
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

const FORMAT_VERSION: u32 = 1;
const MANIFEST_FILE: &str = "manifest.json";
const ENTRIES_FILE: &str = "entries.json";

/// Header of a persisted index, checked before the entries are trusted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexManifest {
    pub format_version: u32,
    pub embedding_model: String,
    pub dimensions: usize,
    pub entry_count: usize,
}

/// Directory holding one `vector_index_<key>` artifact per [`SourceMode`].
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, mode: SourceMode) -> PathBuf {
        self.root.join(format!("vector_index_{}", mode.index_key()))
    }

    pub fn exists(&self, mode: SourceMode) -> bool {
        self.path_for(mode).join(MANIFEST_FILE).is_file()
    }

    /// Write the index atomically: each file goes to a temporary name first.
    pub fn persist(&self, mode: SourceMode, index: &VectorIndex, embedding_model: &str) -> Result<()> {
        let dir = self.path_for(mode);
        std::fs::create_dir_all(&dir)
            .map_err(|e| RagError::io(format!("creating {}", dir.display()), e))?;

        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            embedding_model: embedding_model.to_string(),
            dimensions: index.dimensions,
            entry_count: index.entries.len(),
        };

        // Entries first so a readable manifest never points at missing entries.
        write_json_atomic(&dir.join(ENTRIES_FILE), &index.entries)?;
        write_json_atomic(&dir.join(MANIFEST_FILE), &manifest)?;

        info!(index.key = mode.index_key(), entries = manifest.entry_count, "persisted vector index");
        Ok(())
    }

    /// Load and validate a persisted index.
    ///
    /// # Errors
    ///
    /// [`RagError::VectorIndexError`] when the artifact is missing, unreadable,
    /// or was produced by a different format version or embedding model.
    pub fn load(&self, mode: SourceMode, embedding_model: &str) -> Result<VectorIndex> {
        let dir = self.path_for(mode);
        let manifest: IndexManifest = read_json(&dir.join(MANIFEST_FILE))?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(RagError::VectorIndexError(format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                manifest.format_version
            )));
        }
        if manifest.embedding_model != embedding_model {
            return Err(RagError::VectorIndexError(format!(
                "index was built with '{}', current embedding model is '{embedding_model}'",
                manifest.embedding_model
            )));
        }

        let entries: Vec<IndexEntry> = read_json(&dir.join(ENTRIES_FILE))?;
        if entries.len() != manifest.entry_count {
            return Err(RagError::VectorIndexError(format!(
                "manifest lists {} entries, found {}",
                manifest.entry_count,
                entries.len()
            )));
        }

        let index = VectorIndex::from_entries(manifest.dimensions, entries)?;
        debug!(index.key = mode.index_key(), entries = index.len(), "loaded vector index");
        Ok(index)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|e| {
        RagError::VectorIndexError(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| RagError::VectorIndexError(format!("cannot parse {}: {e}", path.display())))
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| RagError::VectorIndexError(format!("cannot serialize index: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)
        .map_err(|e| RagError::io(format!("writing {}", tmp.display()), e))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| RagError::io(format!("renaming {}", tmp.display()), e))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn entry(id: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            embedding,
            segment: Segment {
                id: id.into(),
                text: format!("text of {id}"),
                metadata: HashMap::new(),
                document_id: "doc".into(),
            },
        }
    }

    fn sample_index() -> VectorIndex {
        VectorIndex::from_entries(
            2,
            vec![
                entry("east", vec![1.0, 0.0]),
                entry("north", vec![0.0, 1.0]),
                entry("north-east", vec![1.0, 1.0]),
                entry("east-again", vec![2.0, 0.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn search_orders_by_score_and_keeps_ties_stable() {
        let results = sample_index().search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.segment.id.as_str()).collect();
        assert_eq!(ids, vec!["east", "east-again", "north-east"]);
        assert!(results[0].score >= results[2].score);
    }

    #[test]
    fn search_returns_fewer_results_than_k_on_small_index() {
        assert_eq!(sample_index().search(&[0.0, 1.0], 10).unwrap().len(), 4);
    }

    #[test]
    fn search_rejects_wrong_dimensions() {
        assert!(matches!(
            sample_index().search(&[1.0, 0.0, 0.0], 3),
            Err(RagError::VectorIndexError(_))
        ));
    }

    #[test]
    fn empty_or_ragged_entries_are_rejected() {
        assert!(VectorIndex::from_entries(2, Vec::new()).is_err());
        assert!(VectorIndex::from_entries(2, vec![entry("a", vec![1.0])]).is_err());
    }

    #[test]
    fn persisted_index_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let index = sample_index();

        assert!(!store.exists(SourceMode::LocalFolder));
        store.persist(SourceMode::LocalFolder, &index, "models/embedding-001").unwrap();
        assert!(store.exists(SourceMode::LocalFolder));
        assert!(dir.path().join("vector_index_default").join("entries.json").is_file());

        let loaded = store.load(SourceMode::LocalFolder, "models/embedding-001").unwrap();
        assert_eq!(loaded.entries(), index.entries());
        assert_eq!(loaded.dimensions(), 2);
    }

    #[test]
    fn load_rejects_other_embedding_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        store.persist(SourceMode::LocalFolder, &sample_index(), "models/embedding-001").unwrap();

        let err = store.load(SourceMode::LocalFolder, "models/text-embedding-004").unwrap_err();
        assert!(matches!(err, RagError::VectorIndexError(_)));
    }

    #[test]
    fn load_rejects_corrupted_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        store.persist(SourceMode::LocalFolder, &sample_index(), "m").unwrap();
        std::fs::write(store.path_for(SourceMode::LocalFolder).join(ENTRIES_FILE), b"{garbage")
            .unwrap();

        assert!(matches!(store.load(SourceMode::LocalFolder, "m"), Err(RagError::VectorIndexError(_))));
    }
}
