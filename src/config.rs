//! Configuration types for document analysis.
//!
//! All pipeline behaviour is controlled through [`AnalysisConfig`], built via
//! its [`AnalysisConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across tasks and to diff two runs to understand
//! why their outputs differ.
//!
//! Nothing in the pipeline is hard-coded: chunk sizing, retrieval depth,
//! prompt budget, retry policy, and timeout all come from here, and the
//! model provider, run recorder, and result cache are injected as trait
//! objects rather than reached for as globals.

use crate::cache::AnalysisCache;
use crate::error::AnalysisError;
use crate::provider::LlmProvider;
use crate::recorder::RunRecorder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for a document analysis run.
///
/// Built via [`AnalysisConfig::builder()`] or [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use deck2insight::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .max_chunk_chars(1200)
///     .overlap_chars(120)
///     .top_k(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Maximum chunk length in characters. Default: 1500.
    ///
    /// Embedding models score short, focused passages better than sprawling
    /// ones, and a bounded chunk keeps each retrieved excerpt small enough
    /// that top-K selection stays meaningful within the prompt budget.
    pub max_chunk_chars: usize,

    /// Characters of trailing context repeated at the start of the next
    /// chunk. Default: 150. Must be smaller than `max_chunk_chars`.
    ///
    /// Hard window splits cut sentences in half; the overlap makes sure the
    /// severed half appears intact in the neighbouring chunk, so a fact
    /// straddling a boundary is still retrievable.
    pub overlap_chars: usize,

    /// Retrieval cutoff: the K highest-scoring chunks passed to the prompt
    /// per analysis section. Default: 3.
    pub top_k: usize,

    /// Upper bound on the composed prompt, in estimated tokens. Default: 6000.
    ///
    /// Chunks are appended whole, in ranked order, until the next one would
    /// cross this line; the rest are dropped. The bound is enforced on the
    /// same chars/4 estimate the composer uses, so the emitted prompt can
    /// never exceed it.
    pub max_prompt_tokens: usize,

    /// Maximum tokens the model may generate. Default: 2048.
    pub max_output_tokens: usize,

    /// Sampling temperature for the analysis call. Default: 0.9.
    ///
    /// Unlike transcription work, business analysis benefits from some
    /// freedom of phrasing; grounding is enforced by the prompt (sections
    /// without evidence must say "Not found"), not by the temperature.
    pub temperature: f32,

    /// Maximum retry attempts on a transient model failure. Default: 3.
    ///
    /// Rate limits and 5xx errors are common under load and usually clear
    /// within seconds. Permanent errors (bad API key, malformed request)
    /// are never retried.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s. A server-supplied
    /// `Retry-After` takes precedence over the computed delay.
    pub retry_backoff_ms: u64,

    /// Per-model-call timeout in seconds. Default: 60.
    ///
    /// Applies to each outbound call individually (generation and
    /// embeddings); a timed-out attempt counts as transient and consumes one
    /// retry.
    pub api_timeout_secs: u64,

    /// Number of chunk-embedding calls in flight at once. Default: 8.
    pub embed_concurrency: usize,

    /// Generation model identifier. `None` uses the provider default.
    pub model: Option<String>,

    /// Embedding model identifier. `None` uses the provider default.
    pub embed_model: Option<String>,

    /// Pre-constructed model provider. When `None`, a Gemini client is
    /// built from `GEMINI_API_KEY` / `GOOGLE_API_KEY`.
    pub provider: Option<Arc<dyn LlmProvider>>,

    /// Append-only run-metadata sink, invoked after each successful run.
    pub recorder: Option<Arc<dyn RunRecorder>>,

    /// Read-through result cache keyed by document content hash. When set,
    /// concurrent identical uploads share a single model call.
    pub cache: Option<Arc<AnalysisCache>>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 1500,
            overlap_chars: 150,
            top_k: 3,
            max_prompt_tokens: 6000,
            max_output_tokens: 2048,
            temperature: 0.9,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            embed_concurrency: 8,
            model: None,
            embed_model: None,
            provider: None,
            recorder: None,
            cache: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("max_chunk_chars", &self.max_chunk_chars)
            .field("overlap_chars", &self.overlap_chars)
            .field("top_k", &self.top_k)
            .field("max_prompt_tokens", &self.max_prompt_tokens)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("embed_concurrency", &self.embed_concurrency)
            .field("model", &self.model)
            .field("embed_model", &self.embed_model)
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("recorder", &self.recorder.as_ref().map(|_| "<dyn RunRecorder>"))
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn max_chunk_chars(mut self, n: usize) -> Self {
        self.config.max_chunk_chars = n;
        self
    }

    pub fn overlap_chars(mut self, n: usize) -> Self {
        self.config.overlap_chars = n;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k.max(1);
        self
    }

    pub fn max_prompt_tokens(mut self, n: usize) -> Self {
        self.config.max_prompt_tokens = n;
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn embed_concurrency(mut self, n: usize) -> Self {
        self.config.embed_concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn embed_model(mut self, model: impl Into<String>) -> Self {
        self.config.embed_model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn recorder(mut self, recorder: Arc<dyn RunRecorder>) -> Self {
        self.config.recorder = Some(recorder);
        self
    }

    pub fn cache(mut self, cache: Arc<AnalysisCache>) -> Self {
        self.config.cache = Some(cache);
        self
    }

    /// Build the configuration, validating cross-field constraints.
    pub fn build(self) -> Result<AnalysisConfig, AnalysisError> {
        let c = &self.config;
        if c.max_chunk_chars == 0 {
            return Err(AnalysisError::InvalidConfiguration(
                "max_chunk_chars must be ≥ 1".into(),
            ));
        }
        if c.overlap_chars >= c.max_chunk_chars {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "overlap_chars ({}) must be smaller than max_chunk_chars ({})",
                c.overlap_chars, c.max_chunk_chars
            )));
        }
        if c.max_prompt_tokens == 0 {
            return Err(AnalysisError::InvalidConfiguration(
                "max_prompt_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Document types ───────────────────────────────────────────────────────

/// The kind of startup document being analyzed.
///
/// Each type carries its own instruction template (see [`crate::prompts`])
/// and therefore its own set of analysis sections. Callers that don't know
/// the type up front can use [`DocumentType::detect`] — a keyword heuristic
/// deliberately kept outside the pipeline's hard logic, so it can be
/// replaced by a smarter classifier without touching any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Generic business document. (default)
    #[default]
    BusinessAnalysis,
    /// Investor pitch deck.
    PitchDeck,
    /// Full business plan.
    BusinessPlan,
    /// Market research report.
    MarketResearch,
    /// Financial model or projections document.
    FinancialModel,
}

impl DocumentType {
    /// All known types, in display order.
    pub const ALL: [DocumentType; 5] = [
        DocumentType::BusinessAnalysis,
        DocumentType::PitchDeck,
        DocumentType::BusinessPlan,
        DocumentType::MarketResearch,
        DocumentType::FinancialModel,
    ];

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::BusinessAnalysis => "Business Analysis",
            DocumentType::PitchDeck => "Pitch Deck",
            DocumentType::BusinessPlan => "Business Plan",
            DocumentType::MarketResearch => "Market Research",
            DocumentType::FinancialModel => "Financial Model",
        }
    }

    /// Keywords whose presence votes for this type.
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            DocumentType::BusinessAnalysis => &[],
            DocumentType::PitchDeck => &[
                "pitch",
                "traction",
                "investment ask",
                "use of funds",
                "valuation",
                "seed round",
                "series a",
                "founding team",
            ],
            DocumentType::BusinessPlan => &[
                "business plan",
                "operations plan",
                "marketing strategy",
                "management team",
                "implementation timeline",
                "milestones",
            ],
            DocumentType::MarketResearch => &[
                "market research",
                "market size",
                "survey",
                "tam",
                "sam",
                "som",
                "cagr",
                "respondents",
                "market share",
            ],
            DocumentType::FinancialModel => &[
                "revenue projection",
                "cash flow",
                "burn rate",
                "unit economics",
                "gross margin",
                "ebitda",
                "break-even",
                "runway",
            ],
        }
    }

    /// Guess the document type from its extracted text.
    ///
    /// Counts keyword occurrences per type; the highest strictly-positive
    /// score wins, earlier types winning ties. Falls back to
    /// `BusinessAnalysis` when nothing matches.
    pub fn detect(text: &str) -> DocumentType {
        let haystack = text.to_lowercase();
        let mut best = DocumentType::BusinessAnalysis;
        let mut best_score = 0usize;
        for dt in DocumentType::ALL {
            let score: usize = dt
                .keywords()
                .iter()
                .map(|kw| haystack.matches(kw).count())
                .sum();
            if score > best_score {
                best = dt;
                best_score = score;
            }
        }
        best
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    /// Accepts both labels ("Pitch Deck") and snake identifiers ("pitch_deck").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_lowercase().replace(['-', '_'], " ");
        DocumentType::ALL
            .into_iter()
            .find(|dt| dt.label().to_lowercase() == norm)
            .ok_or_else(|| {
                format!(
                    "unknown document type '{s}' (expected one of: {})",
                    DocumentType::ALL.map(|d| d.label()).join(", ")
                )
            })
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
