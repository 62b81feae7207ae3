//! JSON bodies of the HTTP API.

use biochat_rag::{Notice, TranscriptEntry, WorkspaceStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type SessionId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreateResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRequest {
    pub use_local_folder: bool,
}

/// Result of an upload or source change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResponse {
    /// `false` when the source was cleared and the welcome state applies.
    pub loaded: bool,
    pub notices: Vec<Notice>,
    pub stats: Option<WorkspaceStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    /// `false` for an empty question; nothing was recorded.
    pub answered: bool,
    pub entry: Option<HistoryEntry>,
}

/// A transcript entry as rendered in the history list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub title: String,
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

impl From<&TranscriptEntry> for HistoryEntry {
    fn from(entry: &TranscriptEntry) -> Self {
        Self {
            title: entry.title(),
            question: entry.question.clone(),
            answer: entry.answer.clone(),
            asked_at: entry.asked_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    /// `None` until a source has been loaded.
    pub stats: Option<WorkspaceStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub notices: Vec<Notice>,
}
