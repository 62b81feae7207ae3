//! Error types for the `biochat-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading documents or answering questions.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The completion model failed to produce an answer.
    #[error("Completion error ({provider}): {message}")]
    CompletionError {
        /// The completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector index could not be built, searched, persisted or loaded.
    #[error("Vector index error: {0}")]
    VectorIndexError(String),

    /// A PDF file could not be parsed.
    #[error("PDF error ({}): {message}", .path.display())]
    PdfError {
        /// The offending file.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// A filesystem operation failed.
    #[error("I/O error ({context}): {source}")]
    IoError {
        /// What was being attempted.
        context: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// No usable document source; the user has to change the input.
    #[error(transparent)]
    InputUnavailable(#[from] InputUnavailable),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RagError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoError { context: context.into(), source }
    }

    /// Whether the failure came from a remote model call.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::EmbeddingError { .. } | Self::CompletionError { .. })
    }
}

/// Reasons a run halts before any document is indexed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputUnavailable {
    #[error("no source selected: upload PDF files or enable the local folder")]
    NoSourceSelected,

    #[error("folder {} does not exist", .0.display())]
    MissingFolder(PathBuf),

    #[error("no PDF documents found in {}", .0.display())]
    NoDocuments(PathBuf),

    #[error("documents in {} contain no extractable text", .0.display())]
    NoText(PathBuf),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
