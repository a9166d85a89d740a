//! PDF text extraction: pull the text layer out of each page via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto the blocking
//! thread pool so Tokio worker threads never stall during parsing.
//!
//! ## Why the text layer, not OCR?
//!
//! Pitch decks and business plans are almost always digitally authored, so
//! the embedded text layer is complete and exact. A scanned document with
//! no text layer is reported as unreadable rather than silently analyzed
//! as an empty corpus.

use crate::document::{looks_like_pdf, PageText};
use crate::error::AnalysisError;
use pdfium_render::prelude::*;
use tracing::{debug, info, warn};

/// Extract the text of every page, in page order.
///
/// # Errors
///
/// `UnreadableDocument` when the bytes are not a valid PDF or no page
/// yields any text.
pub async fn extract_pages(bytes: &[u8]) -> Result<Vec<PageText>, AnalysisError> {
    let owned = bytes.to_vec();
    tokio::task::spawn_blocking(move || extract_pages_blocking(&owned))
        .await
        .map_err(|e| AnalysisError::Internal(format!("extract task panicked: {e}")))?
}

/// Blocking implementation of page text extraction.
fn extract_pages_blocking(bytes: &[u8]) -> Result<Vec<PageText>, AnalysisError> {
    if !looks_like_pdf(bytes) {
        let head = &bytes[..bytes.len().min(4)];
        return Err(AnalysisError::UnreadableDocument {
            detail: format!("not a PDF (magic bytes {head:02x?})"),
        });
    }

    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| AnalysisError::UnreadableDocument {
            detail: format!("pdfium could not parse the document: {e:?}"),
        })?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut out = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let number = idx + 1;
        let text = match page.text() {
            Ok(t) => t.all(),
            Err(e) => {
                warn!("page {}: text extraction failed — {:?}", number, e);
                String::new()
            }
        };
        debug!("page {}: {} chars extracted", number, text.chars().count());
        out.push(PageText { number, text });
    }

    if out.iter().all(|p| p.text.trim().is_empty()) {
        return Err(AnalysisError::UnreadableDocument {
            detail: "no extractable text layer (scanned document without OCR?)".into(),
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests that need a real PDF (and a pdfium binary) live in the e2e
    // suite; here we cover the validation paths that never reach pdfium.

    #[tokio::test]
    async fn garbage_bytes_are_unreadable() {
        let err = extract_pages(b"definitely not a pdf").await.unwrap_err();
        assert!(matches!(err, AnalysisError::UnreadableDocument { .. }));
    }

    #[tokio::test]
    async fn empty_input_is_unreadable() {
        let err = extract_pages(b"").await.unwrap_err();
        assert!(matches!(err, AnalysisError::UnreadableDocument { .. }));
    }
}
