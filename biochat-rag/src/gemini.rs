//! Gemini-backed [`EmbeddingProvider`] and [`CompletionModel`].

use std::error::Error as _;

use async_trait::async_trait;
use tracing::{debug, error};

use biochat_gemini::{Gemini, GeminiBuilder, Model, TaskType};

use crate::completion::CompletionModel;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const PROVIDER: &str = "Gemini";

/// `batchEmbedContents` accepts at most this many requests per call.
pub const MAX_BATCH_SIZE: usize = 100;

/// Render an API error with its full source chain.
fn describe(error: &biochat_gemini::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// An [`EmbeddingProvider`] backed by the Gemini embedding API.
///
/// Queries are embedded with [`TaskType::RetrievalQuery`] and segments with
/// [`TaskType::RetrievalDocument`]. Batches larger than [`MAX_BATCH_SIZE`] are
/// split into several calls.
///
/// # Example
///
/// ```rust,ignore
/// use biochat_rag::gemini::GeminiEmbeddingProvider;
///
/// let provider = GeminiEmbeddingProvider::new(api_key, "models/embedding-001")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct GeminiEmbeddingProvider {
    client: Gemini,
    name: String,
    dimensions: usize,
}

impl GeminiEmbeddingProvider {
    /// Output size of `embedding-001` and `text-embedding-004`.
    const DEFAULT_DIMENSIONS: usize = 768;

    pub fn new(api_key: impl AsRef<str>, model: impl Into<Model>) -> Result<Self> {
        let client = Gemini::with_model(api_key, model).map_err(|e| RagError::EmbeddingError {
            provider: PROVIDER.into(),
            message: format!("failed to create Gemini client: {}", describe(&e)),
        })?;
        Ok(Self::from_client(client))
    }

    /// Wrap an existing client, e.g. one built with a custom base URL.
    pub fn from_client(client: Gemini) -> Self {
        let name = client.model().to_string();
        Self { client, name, dimensions: Self::DEFAULT_DIMENSIONS }
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    fn embedding_error(e: &biochat_gemini::Error) -> RagError {
        error!(provider = PROVIDER, error = %e, "embedding request failed");
        RagError::EmbeddingError { provider: PROVIDER.into(), message: describe(e) }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding query");

        let response = self
            .client
            .embed_content()
            .with_task_type(TaskType::RetrievalQuery)
            .with_text(text)
            .execute()
            .await
            .map_err(|e| Self::embedding_error(&e))?;

        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_BATCH_SIZE) {
            debug!(provider = PROVIDER, batch_size = batch.len(), "embedding batch");

            let response = self
                .client
                .embed_content()
                .with_task_type(TaskType::RetrievalDocument)
                .with_chunks(batch.iter().map(|t| t.to_string()).collect())
                .execute_batch()
                .await
                .map_err(|e| Self::embedding_error(&e))?;

            if response.embeddings.len() != batch.len() {
                return Err(RagError::EmbeddingError {
                    provider: PROVIDER.into(),
                    message: format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        response.embeddings.len()
                    ),
                });
            }
            vectors.extend(response.embeddings.into_iter().map(|e| e.values));
        }

        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A [`CompletionModel`] backed by Gemini `generateContent`.
pub struct GeminiCompletionModel {
    client: Gemini,
    name: String,
    temperature: f32,
    max_retries: u32,
}

impl GeminiCompletionModel {
    pub fn new(api_key: impl AsRef<str>, model: impl Into<Model>) -> Result<Self> {
        let client = GeminiBuilder::new(api_key.as_ref()).with_model(model).build().map_err(|e| {
            RagError::CompletionError {
                provider: PROVIDER.into(),
                message: format!("failed to create Gemini client: {}", describe(&e)),
            }
        })?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: Gemini) -> Self {
        let name = client.model().to_string();
        Self { client, name, temperature: 0.3, max_retries: 2 }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[async_trait]
impl CompletionModel for GeminiCompletionModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .generate_content()
            .with_user_message(prompt)
            .with_temperature(self.temperature)
            .with_max_retries(self.max_retries)
            .execute()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "completion request failed");
                RagError::CompletionError { provider: PROVIDER.into(), message: describe(&e) }
            })?;

        let text = response.text();
        if text.trim().is_empty() {
            let message = match response.block_reason() {
                Some(reason) => format!("prompt was blocked: {reason}"),
                None => "model returned no text".to_string(),
            };
            return Err(RagError::CompletionError { provider: PROVIDER.into(), message });
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
