//! Minimal async client for the Gemini REST API.
//!
//! Only the three endpoints BioChat needs are covered:
//!
//! - `generateContent` through [`ContentBuilder`]
//! - `embedContent` and `batchEmbedContents` through [`EmbedBuilder`]
//!
//! ```rust,ignore
//! use biochat_gemini::{Gemini, Model};
//!
//! let client = Gemini::with_model(api_key, Model::Gemini15Flash)?;
//! let response = client
//!     .generate_content()
//!     .with_user_message("What is photosynthesis?")
//!     .with_temperature(0.3)
//!     .with_max_retries(2)
//!     .execute()
//!     .await?;
//! println!("{}", response.text());
//! ```

pub mod client;
pub mod embedding;
pub mod generation;

#[cfg(test)]
mod response_parsing_tests;

pub use client::{Error, Gemini, GeminiBuilder, Model};
pub use embedding::{
    BatchContentEmbeddingResponse, BatchEmbedContentsRequest, ContentEmbedding,
    ContentEmbeddingResponse, EmbedBuilder, EmbedContentRequest, TaskType,
};
pub use generation::{
    Candidate, Content, ContentBuilder, FinishReason, GenerateContentRequest, GenerationConfig,
    GenerationResponse, Part, PromptFeedback, Role, UsageMetadata,
};
