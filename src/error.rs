//! Error types for the deck2insight library.
//!
//! A single [`AnalysisError`] covers the whole pipeline: every failure is
//! terminal for the current run — no partial analysis is ever returned — and
//! propagates to the caller as one tagged value with the original cause
//! attached. Transient model failures are retried *inside* the model stage
//! (see [`crate::pipeline::llm`]); by the time an error reaches this type the
//! retry budget is already spent.
//!
//! The lower-level [`ProviderError`](crate::provider::ProviderError) carries
//! HTTP-layer detail and the transient/permanent classification the model
//! stage consumes; it surfaces here as the `#[source]` of the model variants.

use std::path::PathBuf;
use thiserror::Error;

use crate::provider::ProviderError;

/// All errors returned by the deck2insight library.
#[derive(Debug, Error)]
pub enum AnalysisError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The byte stream is not a valid PDF, or it contains no extractable
    /// text layer (e.g. a scanned image without OCR).
    #[error("unreadable document: {detail}")]
    UnreadableDocument { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or chunker validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The chunker produced no chunks, so there is nothing to retrieve from.
    #[error("empty corpus: the document produced no text chunks")]
    EmptyCorpus,

    /// The model API rejected the request with a non-transient failure
    /// (authentication, malformed request). Never retried.
    #[error("model request rejected by '{provider}': {source}\nCheck the API key and request parameters; retrying will not help.")]
    ModelRequestRejected {
        provider: String,
        #[source]
        source: ProviderError,
    },

    /// Every retry attempt failed with a transient error.
    #[error("model unavailable after {attempts} attempts: {source}")]
    ModelUnavailable {
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// The model returned an empty response body.
    #[error("unparseable response: the model returned no text")]
    UnparseableResponse,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (joined-task panic and similar).
    #[error("internal error: {0}")]
    Internal(String),
}
