//! Input document model.
//!
//! A [`Document`] is the immutable unit the pipeline works on: the raw
//! bytes, a detected MIME type, and a blake3 content hash that identifies
//! it for caching. It lives for exactly one run — nothing here is persisted.

use crate::error::AnalysisError;

/// PDF magic bytes checked before anything touches pdfium, so a bad upload
/// gets a meaningful error rather than a parser crash.
const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// An uploaded document: immutable bytes plus identity.
#[derive(Debug, Clone)]
pub struct Document {
    bytes: Vec<u8>,
    content_hash: String,
    mime: &'static str,
}

impl Document {
    /// Wrap raw PDF bytes, validating the magic number and computing the
    /// content hash.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, AnalysisError> {
        if !looks_like_pdf(&bytes) {
            let head = &bytes[..bytes.len().min(4)];
            return Err(AnalysisError::UnreadableDocument {
                detail: format!("not a PDF (magic bytes {head:02x?})"),
            });
        }
        Ok(Self {
            content_hash: blake3_hex(&bytes),
            mime: "application/pdf",
            bytes,
        })
    }

    /// Wrap pre-extracted plain text (no magic check, no extraction stage).
    pub fn from_text(text: &str) -> Self {
        Self {
            content_hash: blake3_hex(text.as_bytes()),
            mime: "text/plain",
            bytes: text.as_bytes().to_vec(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex-encoded blake3 hash of the raw bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }
}

/// Text extracted from one page. Page numbers are 1-indexed.
#[derive(Debug, Clone)]
pub struct PageText {
    pub number: usize,
    pub text: String,
}

pub(crate) fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && &bytes[..4] == PDF_MAGIC
}

fn blake3_hex(input: &[u8]) -> String {
    blake3::hash(input).to_hex().to_string()
}
