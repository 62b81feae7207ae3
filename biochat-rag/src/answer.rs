//! Question answering over a [`VectorIndex`]: retrieve, stuff, complete.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::completion::CompletionModel;
use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;

const PROMPT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Build the single prompt sent to the completion model.
pub fn compose_prompt(context: &[SearchResult], question: &str) -> String {
    let context = context.iter().map(|r| r.segment.text.as_str()).collect::<Vec<_>>().join("\n\n");
    format!("{PROMPT_PREAMBLE}\n\n{context}\n\nQuestion: {question}\nHelpful Answer:")
}

/// Progress of a single question through the answer flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerState {
    Idle,
    Embedding,
    Retrieving,
    Composing,
    Answered,
    Failed,
}

/// A generated answer and the segments it was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SearchResult>,
}

/// Runs one question end to end against an index.
#[derive(Clone)]
pub struct Answerer {
    embedder: Arc<dyn EmbeddingProvider>,
    model: Arc<dyn CompletionModel>,
    top_k: usize,
}

impl Answerer {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn CompletionModel>,
        top_k: usize,
    ) -> Self {
        Self { embedder, model, top_k }
    }

    /// Answer `question` from the `top_k` most similar segments.
    ///
    /// Returns `Ok(None)` for an empty or whitespace-only question without
    /// touching the embedder or the model.
    pub async fn answer(&self, index: &VectorIndex, question: &str) -> Result<Option<Answer>> {
        let question = question.trim();
        if question.is_empty() {
            trace_state(AnswerState::Idle);
            return Ok(None);
        }

        let result = self.run(index, question).await;
        trace_state(if result.is_ok() { AnswerState::Answered } else { AnswerState::Failed });
        result.map(Some)
    }

    async fn run(&self, index: &VectorIndex, question: &str) -> Result<Answer> {
        trace_state(AnswerState::Embedding);
        let query = self.embedder.embed(question).await?;

        trace_state(AnswerState::Retrieving);
        let sources = index.search(&query, self.top_k)?;

        trace_state(AnswerState::Composing);
        let prompt = compose_prompt(&sources, question);
        let text = self.model.complete(&prompt).await?;

        info!(sources = sources.len(), answer_len = text.len(), "answered question");
        Ok(Answer { text, sources })
    }
}

fn trace_state(state: AnswerState) {
    debug!(?state, "answer flow");
}
