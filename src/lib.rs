//! # deck2insight
//!
//! Analyze startup documents (pitch decks, business plans, market research,
//! financial models) with retrieval-augmented LLM calls.
//!
//! ## Why this crate?
//!
//! Stuffing an entire 40-page deck into a prompt wastes tokens on boilerplate
//! and drowns the model in irrelevant context. Instead this crate extracts
//! the PDF's text layer, splits it into overlapping chunks, embeds them once,
//! and retrieves only the chunks relevant to each analysis section before
//! composing a bounded prompt — so the model reads the evidence that matters
//! and the per-document cost stays flat regardless of document size.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract   pull the text layer via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 2. Chunk     greedy windows with bounded overlap
//!  ├─ 3. Retrieve  embed once, rank per section by cosine similarity, top-K
//!  ├─ 4. Compose   persona + per-section context + task template ≤ budget
//!  ├─ 5. Model     generation call with retry/backoff/timeout
//!  └─ 6. Format    raw text → ordered named sections
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deck2insight::{analyze, AnalysisConfig, DocumentType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / GOOGLE_API_KEY
//!     let config = AnalysisConfig::default();
//!     let bytes = std::fs::read("pitch_deck.pdf")?;
//!     let output = analyze(&bytes, DocumentType::PitchDeck, &config).await?;
//!     for section in output.result.sections() {
//!         println!("## {}\n{}\n", section.name, section.content);
//!     }
//!     eprintln!("tokens: {} in / {} out",
//!         output.stats.input_tokens,
//!         output.stats.output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Caching identical uploads
//!
//! Share an [`AnalysisCache`] across requests and identical documents cost
//! one model call, even when they arrive concurrently:
//!
//! ```rust,no_run
//! use deck2insight::{AnalysisCache, AnalysisConfig};
//! use std::sync::Arc;
//!
//! let cache = Arc::new(AnalysisCache::new());
//! let config = AnalysisConfig::builder().cache(cache).build().unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `deck2insight` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! deck2insight = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod recorder;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_file, analyze_pages, analyze_sync, analyze_text};
pub use cache::AnalysisCache;
pub use config::{AnalysisConfig, AnalysisConfigBuilder, DocumentType};
pub use document::{Document, PageText};
pub use error::AnalysisError;
pub use output::{AnalysisOutput, AnalysisResult, AnalysisSection, RunRecord, RunStats};
pub use pipeline::chunk::{Chunk, ChunkConfig};
pub use provider::{
    GeminiProvider, GenerationOptions, GenerationResponse, LlmProvider, MockOutcome,
    MockProvider, ProviderError,
};
pub use recorder::{NoopRecorder, RunRecorder};
