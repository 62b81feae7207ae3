//! # biochat-rag
//!
//! Question answering over PDF documents.
//!
//! The flow for one session:
//!
//! 1. [`InputResolver`] turns uploaded files or the local folder into per-page
//!    [`Document`]s.
//! 2. A [`Chunker`] splits them into overlapping [`Segment`]s.
//! 3. An [`EmbeddingProvider`] embeds the segments into a [`VectorIndex`],
//!    which [`IndexStore`] persists for the local folder.
//! 4. The [`Answerer`] retrieves the `top_k` closest segments for a question
//!    and asks a [`CompletionModel`].
//! 5. Successful answers go to the session [`Transcript`].
//!
//! [`RagPipeline`] wires steps 1–3 together and [`ChatSession`] holds the
//! per-user state.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use biochat_rag::gemini::{GeminiCompletionModel, GeminiEmbeddingProvider};
//! use biochat_rag::{ChatSession, InputRequest, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .embedding_provider(Arc::new(GeminiEmbeddingProvider::new(&key, "models/embedding-001")?))
//!     .completion_model(Arc::new(GeminiCompletionModel::new(&key, "gemini-1.5-flash")?))
//!     .build()?;
//!
//! let mut session = ChatSession::new();
//! session.load(&pipeline, &InputRequest::local_folder()).await?;
//! let entry = session.ask(&pipeline, "What is photosynthesis?").await?;
//! ```

pub mod answer;
pub mod chunking;
pub mod completion;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;
pub mod gemini;
pub mod index;
pub mod input;
pub mod loader;
pub mod pipeline;
pub mod session;
pub mod transcript;

pub use answer::{Answer, AnswerState, Answerer, compose_prompt};
pub use chunking::{Chunker, RecursiveChunker};
pub use completion::CompletionModel;
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Document, SearchResult, Segment};
pub use embedding::EmbeddingProvider;
pub use error::{InputUnavailable, RagError, Result};
pub use index::{IndexEntry, IndexManifest, IndexStore, VectorIndex};
pub use input::{InputRequest, InputResolver, ResolvedInput, SourceMode, UploadedFile};
pub use pipeline::{
    IndexOrigin, Notice, NoticeLevel, RagPipeline, RagPipelineBuilder, Workspace, WorkspaceStats,
};
pub use session::ChatSession;
pub use transcript::{Transcript, TranscriptEntry};
