//! One user's session: the active workspace and the transcript.
//!
//! The session remembers the local-folder choice separately from the
//! workspace. Uploaded files take precedence over the local folder, so
//! toggling the folder while uploads are active only records the choice; it
//! applies once the uploads are removed.

use tracing::info;

use crate::error::{InputUnavailable, Result};
use crate::input::{InputRequest, SourceMode, UploadedFile};
use crate::pipeline::{Notice, RagPipeline, Workspace};
use crate::transcript::{Transcript, TranscriptEntry};

/// Session state. The server keeps each one behind its own mutex.
#[derive(Debug, Default)]
pub struct ChatSession {
    transcript: Transcript,
    workspace: Option<Workspace>,
    use_local_folder: bool,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    pub fn use_local_folder(&self) -> bool {
        self.use_local_folder
    }

    /// Whether the active workspace was built from uploaded files.
    pub fn has_uploads(&self) -> bool {
        self.workspace.as_ref().is_some_and(|workspace| workspace.mode() == SourceMode::Uploaded)
    }

    /// Replace the active workspace.
    ///
    /// The previous workspace is dropped first, so a failed load leaves the
    /// session without one and an old upload directory is removed right away.
    pub async fn load(&mut self, pipeline: &RagPipeline, request: &InputRequest) -> Result<Vec<Notice>> {
        self.workspace = None;
        let workspace = pipeline.load_workspace(request).await?;
        let notices = workspace.notices().to_vec();
        self.workspace = Some(workspace);
        Ok(notices)
    }

    /// Build a workspace from newly uploaded files, replacing any earlier one.
    pub async fn upload(&mut self, pipeline: &RagPipeline, uploads: Vec<UploadedFile>) -> Result<Vec<Notice>> {
        let request = InputRequest { uploads, use_local_folder: self.use_local_folder };
        self.load(pipeline, &request).await
    }

    /// Record the local-folder choice.
    ///
    /// With uploads active the workspace is left alone. Otherwise the folder
    /// is loaded when enabled and the workspace is cleared when disabled.
    pub async fn set_local_folder(&mut self, pipeline: &RagPipeline, enabled: bool) -> Result<Vec<Notice>> {
        self.use_local_folder = enabled;
        if self.has_uploads() {
            info!(use_local_folder = enabled, "uploads active, keeping uploaded workspace");
            let notices = if enabled {
                vec![Notice::warning("Uploaded files take precedence over the local folder")]
            } else {
                Vec::new()
            };
            return Ok(notices);
        }
        self.apply_local_folder(pipeline).await
    }

    /// Drop the uploaded workspace and fall back to the local folder when it
    /// is enabled.
    pub async fn clear_uploads(&mut self, pipeline: &RagPipeline) -> Result<Vec<Notice>> {
        if !self.has_uploads() {
            return Ok(Vec::new());
        }
        self.workspace = None;
        self.apply_local_folder(pipeline).await
    }

    async fn apply_local_folder(&mut self, pipeline: &RagPipeline) -> Result<Vec<Notice>> {
        if self.use_local_folder {
            self.load(pipeline, &InputRequest::local_folder()).await
        } else {
            self.workspace = None;
            Ok(Vec::new())
        }
    }

    /// Answer `question` and record it.
    ///
    /// Returns `Ok(None)` for an empty question. On error the transcript is
    /// left unchanged.
    pub async fn ask(
        &mut self,
        pipeline: &RagPipeline,
        question: &str,
    ) -> Result<Option<TranscriptEntry>> {
        if question.trim().is_empty() {
            return Ok(None);
        }
        let Some(workspace) = &self.workspace else {
            return Err(InputUnavailable::NoSourceSelected.into());
        };

        let Some(answer) = pipeline.answerer().answer(workspace.index(), question).await? else {
            return Ok(None);
        };

        let entry = TranscriptEntry::new(question, answer.text);
        self.transcript.append(entry.clone());
        info!(entries = self.transcript.len(), "transcript updated");
        Ok(Some(entry))
    }

    pub fn clear_history(&mut self) {
        self.transcript.clear();
    }
}
