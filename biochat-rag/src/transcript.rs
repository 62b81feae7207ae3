//! Per-session question/answer history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const TITLE_LIMIT: usize = 60;

/// One answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into(), asked_at: Utc::now() }
    }

    /// The question, cut to 60 characters with a trailing `...` when longer.
    pub fn title(&self) -> String {
        if self.question.chars().count() <= TITLE_LIMIT {
            return self.question.clone();
        }
        let mut title: String = self.question.chars().take(TITLE_LIMIT).collect();
        title.push_str("...");
        title
    }
}

/// Entries in the order they were appended. Only successful answers are recorded.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Most recent entry first.
    pub fn list(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
