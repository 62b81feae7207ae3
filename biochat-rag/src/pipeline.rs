//! Workspace orchestration.
//!
//! [`RagPipeline`] turns an [`InputRequest`] into a ready-to-query
//! [`Workspace`]: resolve input → chunk → load the cached index or embed and
//! build a new one. Construct one via [`RagPipeline::builder()`].
//!
//! # Example
//!
//! ```rust,ignore
//! use biochat_rag::{InputRequest, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .completion_model(Arc::new(model))
//!     .local_folder("./docs")
//!     .index_root(".")
//!     .build()?;
//!
//! let workspace = pipeline.load_workspace(&InputRequest::local_folder()).await?;
//! let answer = pipeline.answerer().answer(workspace.index(), "What is ATP?").await?;
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{info, warn};

use crate::answer::Answerer;
use crate::chunking::{Chunker, RecursiveChunker};
use crate::completion::CompletionModel;
use crate::config::RagConfig;
use crate::document::{Document, Segment};
use crate::embedding::EmbeddingProvider;
use crate::error::{InputUnavailable, RagError, Result};
use crate::index::{IndexStore, VectorIndex};
use crate::input::{InputRequest, InputResolver, SourceMode};

/// Maximum number of file names listed in [`WorkspaceStats`].
const LISTED_FILES: usize = 5;
/// Document count at which the capacity gauge reads 100%.
const CAPACITY_DOCUMENTS: usize = 10;

/// Severity of a user-facing status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A status line produced while loading a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

/// Whether the active index came from disk or was embedded in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexOrigin {
    Loaded,
    Built,
}

/// The active vector index of a session plus what it was built from.
///
/// Owns the upload directory (if any); dropping the workspace removes it.
#[derive(Debug)]
pub struct Workspace {
    mode: SourceMode,
    root: PathBuf,
    document_count: usize,
    segment_count: usize,
    files: Vec<String>,
    index: VectorIndex,
    origin: IndexOrigin,
    notices: Vec<Notice>,
    _upload_dir: Option<TempDir>,
}

impl Workspace {
    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn origin(&self) -> IndexOrigin {
        self.origin
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    /// Distinct file names in load order.
    pub fn files(&self) -> &[String] {
        &self.files
    }
}

/// Summary shown next to the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceStats {
    pub mode: SourceMode,
    pub document_count: usize,
    pub segment_count: usize,
    /// `min(documents / 10, 1)` as a percentage.
    pub capacity_percent: u8,
    pub files: Vec<String>,
    /// Files loaded beyond the listed ones.
    pub more_files: usize,
    pub index_origin: IndexOrigin,
    pub embedding_model: String,
    pub chat_model: String,
}

/// The document question-answering pipeline.
///
/// Stateless between calls: every [`load_workspace`](Self::load_workspace)
/// produces a fresh [`Workspace`], so it can be shared across sessions.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    completion_model: Arc<dyn CompletionModel>,
    chunker: Arc<dyn Chunker>,
    resolver: InputResolver,
    store: IndexStore,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    pub fn completion_model(&self) -> &Arc<dyn CompletionModel> {
        &self.completion_model
    }

    pub fn index_store(&self) -> &IndexStore {
        &self.store
    }

    pub fn local_folder(&self) -> &Path {
        self.resolver.local_folder()
    }

    /// An [`Answerer`] using this pipeline's models and `top_k`.
    pub fn answerer(&self) -> Answerer {
        Answerer::new(
            self.embedding_provider.clone(),
            self.completion_model.clone(),
            self.config.top_k,
        )
    }

    /// Resolve the input, chunk it and make an index available.
    ///
    /// In local-folder mode a persisted index is reused when it loads cleanly;
    /// a broken one is logged and rebuilt. A failure to persist the new index
    /// becomes a warning notice, not an error.
    ///
    /// # Errors
    ///
    /// [`RagError::InputUnavailable`] when there is nothing to index, or any
    /// loading or embedding error.
    pub async fn load_workspace(&self, request: &InputRequest) -> Result<Workspace> {
        let resolved = self.resolver.resolve(request)?;
        let mut notices = Vec::new();

        match resolved.mode {
            SourceMode::Uploaded => {
                notices.push(Notice::success(format!("{} file(s) uploaded", resolved.upload_count)));
            }
            SourceMode::LocalFolder => notices.push(Notice::success(format!(
                "{} document(s) loaded from {}",
                resolved.documents.len(),
                resolved.root.display()
            ))),
        }

        let segments: Vec<Segment> =
            resolved.documents.iter().flat_map(|doc| self.chunker.chunk(doc)).collect();
        if segments.is_empty() {
            return Err(InputUnavailable::NoText(resolved.root.clone()).into());
        }
        info!(
            mode = resolved.mode.index_key(),
            documents = resolved.documents.len(),
            chunk_count = segments.len(),
            "chunked documents"
        );

        let files = distinct_file_names(&resolved.documents);
        let document_count = resolved.documents.len();
        let segment_count = segments.len();
        let (index, origin) = self.load_or_build_index(resolved.mode, segments, &mut notices).await?;

        Ok(Workspace {
            mode: resolved.mode,
            root: resolved.root,
            document_count,
            segment_count,
            files,
            index,
            origin,
            notices,
            _upload_dir: resolved.upload_dir,
        })
    }

    async fn load_or_build_index(
        &self,
        mode: SourceMode,
        segments: Vec<Segment>,
        notices: &mut Vec<Notice>,
    ) -> Result<(VectorIndex, IndexOrigin)> {
        let model = self.embedding_provider.name();

        if mode.persists_index() && self.store.exists(mode) {
            match self.store.load(mode, model) {
                Ok(index) => {
                    info!(index.key = mode.index_key(), entries = index.len(), "index loaded from cache");
                    notices.push(Notice::success("Index loaded from cache"));
                    return Ok((index, IndexOrigin::Loaded));
                }
                Err(e) => {
                    warn!(index.key = mode.index_key(), error = %e, "persisted index unusable, rebuilding");
                    notices.push(Notice::warning(format!("Error loading index: {e}. Rebuilding.")));
                }
            }
        }

        let index = VectorIndex::build(segments, self.embedding_provider.as_ref()).await?;
        notices.push(Notice::success(format!("Index built from {} segment(s)", index.len())));

        if mode.persists_index() {
            if let Err(e) = self.store.persist(mode, &index, model) {
                warn!(index.key = mode.index_key(), error = %e, "failed to persist index");
                notices.push(Notice::warning(format!("Could not save index: {e}")));
            }
        }

        Ok((index, IndexOrigin::Built))
    }

    pub fn stats(&self, workspace: &Workspace) -> WorkspaceStats {
        let capacity = workspace.document_count.min(CAPACITY_DOCUMENTS) * 100 / CAPACITY_DOCUMENTS;
        WorkspaceStats {
            mode: workspace.mode,
            document_count: workspace.document_count,
            segment_count: workspace.segment_count,
            capacity_percent: capacity as u8,
            files: workspace.files.iter().take(LISTED_FILES).cloned().collect(),
            more_files: workspace.files.len().saturating_sub(LISTED_FILES),
            index_origin: workspace.origin,
            embedding_model: self.embedding_provider.name().to_string(),
            chat_model: self.completion_model.name().to_string(),
        }
    }
}

fn distinct_file_names(documents: &[Document]) -> Vec<String> {
    let mut seen = HashSet::new();
    documents
        .iter()
        .filter_map(|doc| doc.source())
        .map(|source| {
            Path::new(source)
                .file_name()
                .map_or_else(|| source.to_string(), |name| name.to_string_lossy().into_owned())
        })
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Builder for constructing a [`RagPipeline`].
///
/// The embedding provider and completion model are required. The chunker
/// defaults to a [`RecursiveChunker`] sized from the config, the local folder
/// to `./docs` and the index root to the working directory.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    completion_model: Option<Arc<dyn CompletionModel>>,
    chunker: Option<Arc<dyn Chunker>>,
    local_folder: Option<PathBuf>,
    index_root: Option<PathBuf>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the completion model.
    pub fn completion_model(mut self, model: Arc<dyn CompletionModel>) -> Self {
        self.completion_model = Some(model);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    pub fn local_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.local_folder = Some(folder.into());
        self
    }

    /// Directory that holds the `vector_index_*` artifacts.
    pub fn index_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.index_root = Some(root.into());
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a model is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let completion_model = self
            .completion_model
            .ok_or_else(|| RagError::ConfigError("completion_model is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });

        Ok(RagPipeline {
            config,
            embedding_provider,
            completion_model,
            chunker,
            resolver: InputResolver::new(self.local_folder.unwrap_or_else(|| PathBuf::from("./docs"))),
            store: IndexStore::new(self.index_root.unwrap_or_else(|| PathBuf::from("."))),
        })
    }
}
