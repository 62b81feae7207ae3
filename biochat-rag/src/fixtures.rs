//! Test fixtures shared by the unit tests and by dependent crates' tests:
//! deterministic model doubles and PDF synthesis.
//!
//! Compiled for this crate's tests and behind the `test-fixtures` feature.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use crate::completion::CompletionModel;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

pub const DIM: usize = 256;

pub const BIOLOGY_PAGES: [&str; 5] = [
    "Cells are the basic unit of life.",
    "Enzymes lower the activation energy of reactions.",
    "Photosynthesis converts light energy into chemical energy stored in glucose.",
    "Mitochondria produce ATP through cellular respiration.",
    "DNA stores genetic information in a double helix.",
];

/// Hashes lower-cased words into a fixed-size bag-of-words vector.
#[derive(Debug, Default)]
pub struct HashEmbedder {
    pub query_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let word = word.to_lowercase();
        let bucket = word.bytes().fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
        v[bucket % DIM] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(bag_of_words(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "test/hash-embedder"
    }
}

/// Echoes the first context segment back as the answer.
#[derive(Debug, Default)]
pub struct EchoModel {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl EchoModel {
    pub fn failing() -> Self {
        Self { calls: AtomicUsize::new(0), fail: true }
    }
}

#[async_trait]
impl CompletionModel for EchoModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::CompletionError {
                provider: "echo".into(),
                message: "quota exceeded".into(),
            });
        }
        let context = prompt.split("\n\n").nth(1).unwrap_or_default();
        Ok(format!("From the documents: {context}"))
    }

    fn name(&self) -> &str {
        "test/echo"
    }
}

/// A PDF with one line of text per page.
pub fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let stream = content.encode().expect("encode page content");
        let content_id = doc.add_object(Stream::new(dictionary! {}, stream));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize pdf");
    bytes
}

/// Write [`pdf_bytes`] to `path`.
pub fn write_pdf(path: &Path, pages: &[&str]) {
    std::fs::write(path, pdf_bytes(pages)).expect("write pdf fixture");
}
