//! Completion model trait: prompt in, answer text out.

use async_trait::async_trait;

use crate::error::Result;

/// A chat model that turns a fully composed prompt into an answer.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Generate the answer text for `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Identifier of the model, shown in stats.
    fn name(&self) -> &str;
}
