//! `embedContent` / `batchEmbedContents` request/response model and builder.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::{EmptyResponseSnafu, Error, GeminiClient};
use crate::generation::Content;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    RetrievalQuery,
    RetrievalDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedContentRequest {
    pub model: String,
    pub content: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEmbedContentsRequest {
    pub requests: Vec<EmbedContentRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEmbedding {
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEmbeddingResponse {
    pub embedding: ContentEmbedding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchContentEmbeddingResponse {
    #[serde(default)]
    pub embeddings: Vec<ContentEmbedding>,
}

/// Builder for embedding requests.
pub struct EmbedBuilder {
    client: Arc<GeminiClient>,
    contents: Vec<String>,
    task_type: Option<TaskType>,
}

impl EmbedBuilder {
    pub(crate) fn new(client: Arc<GeminiClient>) -> Self {
        Self { client, contents: Vec::new(), task_type: None }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.contents.push(text.into());
        self
    }

    pub fn with_chunks(mut self, chunks: Vec<String>) -> Self {
        self.contents.extend(chunks);
        self
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = Some(task_type);
        self
    }

    fn request_for(&self, text: String) -> EmbedContentRequest {
        EmbedContentRequest {
            model: self.client.model.as_str().to_string(),
            content: Content::text(text),
            task_type: self.task_type,
        }
    }

    /// Embed the first text added to the builder.
    pub async fn execute(mut self) -> Result<ContentEmbeddingResponse, Error> {
        if self.contents.is_empty() {
            return EmptyResponseSnafu { what: "input text" }.fail();
        }
        let text = self.contents.swap_remove(0);
        let request = self.request_for(text);
        self.client.embed_content(request).await
    }

    /// Embed every text added to the builder in one `batchEmbedContents` call.
    pub async fn execute_batch(mut self) -> Result<BatchContentEmbeddingResponse, Error> {
        let contents = std::mem::take(&mut self.contents);
        let requests = contents.into_iter().map(|text| self.request_for(text)).collect();
        self.client.embed_content_batch(BatchEmbedContentsRequest { requests }).await
    }
}
