//! Input resolution: uploaded files or the fixed local folder.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{info, warn};

use crate::document::Document;
use crate::error::{InputUnavailable, RagError, Result};
use crate::loader;

/// Where the documents of a run come from. Selects the persisted index artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    LocalFolder,
    Uploaded,
}

impl SourceMode {
    /// Key of the on-disk index artifact for this mode.
    pub fn index_key(self) -> &'static str {
        match self {
            SourceMode::LocalFolder => "default",
            SourceMode::Uploaded => "uploaded",
        }
    }

    /// Only the local folder is stable enough across runs to be worth caching.
    pub fn persists_index(self) -> bool {
        matches!(self, SourceMode::LocalFolder)
    }
}

/// A file blob received from the upload control.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// The user's source choice for one run.
#[derive(Debug, Clone, Default)]
pub struct InputRequest {
    pub uploads: Vec<UploadedFile>,
    pub use_local_folder: bool,
}

impl InputRequest {
    pub fn uploads(uploads: Vec<UploadedFile>) -> Self {
        Self { uploads, use_local_folder: false }
    }

    pub fn local_folder() -> Self {
        Self { uploads: Vec::new(), use_local_folder: true }
    }
}

/// Documents of one run plus the directory they were read from.
///
/// For uploads the directory is a [`TempDir`] that is removed when this value
/// (or the workspace that takes it over) is dropped.
#[derive(Debug)]
pub struct ResolvedInput {
    pub mode: SourceMode,
    pub documents: Vec<Document>,
    pub root: PathBuf,
    pub upload_count: usize,
    pub upload_dir: Option<TempDir>,
}

/// Turns an [`InputRequest`] into documents.
#[derive(Debug, Clone)]
pub struct InputResolver {
    local_folder: PathBuf,
}

impl InputResolver {
    pub fn new(local_folder: impl Into<PathBuf>) -> Self {
        Self { local_folder: local_folder.into() }
    }

    pub fn local_folder(&self) -> &Path {
        &self.local_folder
    }

    /// Uploads win over the local folder; with neither there is nothing to do.
    ///
    /// # Errors
    ///
    /// [`RagError::InputUnavailable`] when no source is selected, the folder is
    /// missing, or no PDF document could be found.
    pub fn resolve(&self, request: &InputRequest) -> Result<ResolvedInput> {
        if !request.uploads.is_empty() {
            self.resolve_uploads(&request.uploads)
        } else if request.use_local_folder {
            self.resolve_local_folder()
        } else {
            Err(InputUnavailable::NoSourceSelected.into())
        }
    }

    fn resolve_uploads(&self, uploads: &[UploadedFile]) -> Result<ResolvedInput> {
        let dir = tempfile::Builder::new()
            .prefix("biochat-upload-")
            .tempdir()
            .map_err(|e| RagError::io("creating upload directory", e))?;

        let mut written = 0;
        let mut seen = HashSet::new();
        for upload in uploads {
            let Some(name) = sanitize_file_name(&upload.name) else {
                warn!(name = %upload.name, "skipping upload without a usable file name");
                continue;
            };
            // Case-folded so that case-insensitive filesystems behave the same.
            if !seen.insert(name.to_lowercase()) {
                warn!(name = %upload.name, file = %name, "skipping upload with a duplicate file name");
                continue;
            }
            let path = dir.path().join(name);
            std::fs::write(&path, &upload.bytes)
                .map_err(|e| RagError::io(format!("writing {}", path.display()), e))?;
            written += 1;
        }

        let documents = loader::load_directory(dir.path())?;
        if documents.is_empty() {
            return Err(InputUnavailable::NoDocuments(dir.path().to_path_buf()).into());
        }

        info!(files = written, documents = documents.len(), "resolved uploaded files");
        Ok(ResolvedInput {
            mode: SourceMode::Uploaded,
            documents,
            root: dir.path().to_path_buf(),
            upload_count: written,
            upload_dir: Some(dir),
        })
    }

    fn resolve_local_folder(&self) -> Result<ResolvedInput> {
        if !self.local_folder.is_dir() {
            return Err(InputUnavailable::MissingFolder(self.local_folder.clone()).into());
        }

        let documents = loader::load_directory(&self.local_folder)?;
        if documents.is_empty() {
            return Err(InputUnavailable::NoDocuments(self.local_folder.clone()).into());
        }

        info!(
            folder = %self.local_folder.display(),
            documents = documents.len(),
            "resolved local folder"
        );
        Ok(ResolvedInput {
            mode: SourceMode::LocalFolder,
            documents,
            root: self.local_folder.clone(),
            upload_count: 0,
            upload_dir: None,
        })
    }
}

/// Keep only the final path component of a client-supplied name.
fn sanitize_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(last.to_string())
}
