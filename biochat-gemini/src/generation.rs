//! `generateContent` request/response model and builder.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::{Error, GeminiClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// A single part of a message. Non-text parts deserialize with `text: None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self { parts: vec![Part { text: Some(text.into()) }], role: None }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
    Recitation,
    Other,
    #[serde(other)]
    FinishReasonUnspecified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
    #[serde(default)]
    pub index: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: Option<i32>,
    #[serde(default)]
    pub candidates_token_count: Option<i32>,
    #[serde(default)]
    pub total_token_count: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    pub model_version: Option<String>,
}

impl GenerationResponse {
    /// Concatenated text of the first candidate, empty when there is none.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content.parts.iter().filter_map(|part| part.text.as_deref()).collect::<String>()
            })
            .unwrap_or_default()
    }

    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback.as_ref().and_then(|feedback| feedback.block_reason.as_deref())
    }
}

/// Builder for a single-turn `generateContent` call.
pub struct ContentBuilder {
    client: Arc<GeminiClient>,
    contents: Vec<Content>,
    generation_config: Option<GenerationConfig>,
    max_retries: u32,
}

impl ContentBuilder {
    pub(crate) fn new(client: Arc<GeminiClient>) -> Self {
        Self { client, contents: Vec::new(), generation_config: None, max_retries: 0 }
    }

    pub fn with_user_message(mut self, text: impl Into<String>) -> Self {
        self.contents.push(Content::text(text).with_role(Role::User));
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.generation_config.get_or_insert_with(GenerationConfig::default).temperature =
            Some(temperature);
        self
    }

    /// Number of re-attempts on transient failures (network, 429, 5xx).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn build(&self) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: self.contents.clone(),
            generation_config: self.generation_config.clone(),
        }
    }

    pub async fn execute(self) -> Result<GenerationResponse, Error> {
        let request = self.build();
        self.client.generate_content_raw(request, self.max_retries).await
    }
}
