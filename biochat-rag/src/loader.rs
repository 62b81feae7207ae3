//! PDF loading: one [`Document`] per page.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::document::{Document, PAGE_KEY, SOURCE_KEY};
use crate::error::{RagError, Result};

/// List the `*.pdf` files directly inside `dir` (case-insensitive, sorted by name).
pub fn pdf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| RagError::io(format!("reading directory {}", dir.display()), e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| RagError::io(format!("reading directory {}", dir.display()), e))?
            .path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Extract the text of every page of a PDF file.
pub fn load_pdf(path: &Path) -> Result<Vec<Document>> {
    let pdf_error =
        |e: lopdf::Error| RagError::PdfError { path: path.to_path_buf(), message: e.to_string() };

    let pdf = lopdf::Document::load(path).map_err(pdf_error)?;
    let source = path.to_string_lossy().into_owned();

    let mut documents = Vec::new();
    for (page, page_number) in pdf.get_pages().into_keys().enumerate() {
        let text = pdf.extract_text(&[page_number]).map_err(pdf_error)?;
        let metadata = HashMap::from([
            (SOURCE_KEY.to_string(), source.clone()),
            (PAGE_KEY.to_string(), page.to_string()),
        ]);
        documents.push(Document { id: format!("{source}#{page}"), text, metadata });
    }

    debug!(document.source = %source, pages = documents.len(), "loaded pdf");
    Ok(documents)
}

/// Load every PDF in `dir`, in file-name order.
pub fn load_directory(dir: &Path) -> Result<Vec<Document>> {
    let files = pdf_files(dir)?;
    let mut documents = Vec::new();
    for file in &files {
        documents.extend(load_pdf(file)?);
    }
    info!(dir = %dir.display(), files = files.len(), documents = documents.len(), "loaded directory");
    Ok(documents)
}
