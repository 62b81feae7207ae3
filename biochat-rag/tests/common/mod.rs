//! Shared setup for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

pub use biochat_rag::fixtures::{BIOLOGY_PAGES, EchoModel, HashEmbedder, pdf_bytes, write_pdf};

pub fn models() -> (Arc<HashEmbedder>, Arc<EchoModel>) {
    (Arc::new(HashEmbedder::default()), Arc::new(EchoModel::default()))
}
