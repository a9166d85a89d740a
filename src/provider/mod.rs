//! Model provider abstraction: text generation and embeddings.
//!
//! The pipeline never talks to an API directly — it calls through
//! [`LlmProvider`], injected as an `Arc<dyn LlmProvider>` via
//! [`crate::config::AnalysisConfig`]. That keeps the network edge in exactly
//! one place and makes every pipeline stage testable against
//! [`MockProvider`] with no network at all.
//!
//! [`ProviderError`] is deliberately lower-level than
//! [`crate::error::AnalysisError`]: it preserves the HTTP-shaped detail
//! (status class, `Retry-After`) that the retry loop in
//! [`crate::pipeline::llm`] needs to decide between backing off and giving
//! up immediately.

pub mod gemini;
pub mod mock;

pub use gemini::GeminiProvider;
pub use mock::{MockOutcome, MockProvider};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Options for a single generation call.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// Sampling temperature. `None` uses the provider default.
    pub temperature: Option<f32>,
    /// Maximum tokens the model may generate. `None` uses the provider default.
    pub max_output_tokens: Option<usize>,
}

/// Raw result of a generation call, before any section parsing.
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    /// The generated text, verbatim.
    pub text: String,
    /// Input token count as reported by the provider (0 if unreported).
    pub prompt_tokens: usize,
    /// Output token count as reported by the provider (0 if unreported).
    pub completion_tokens: usize,
}

/// A text-generation + embedding backend.
///
/// Implementations must be cheap to call concurrently: chunk embeddings fan
/// out with bounded concurrency over a single shared instance.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider name for logs and error messages, e.g. `"gemini"`.
    fn name(&self) -> &str;

    /// Generate text for a prompt.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, ProviderError>;

    /// Embed a piece of text into a fixed-length vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Errors produced by a provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (connect, TLS, mid-body).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not the JSON shape we expect.
    #[error("response JSON did not parse: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP 429. `retry_after_secs` carries the server's `Retry-After`
    /// header when present.
    #[error("rate limited by '{provider}'")]
    RateLimited {
        provider: &'static str,
        retry_after_secs: Option<u64>,
    },

    /// The call exceeded the configured timeout.
    #[error("call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// HTTP 401/403. Retrying will not help.
    #[error("authentication failed for '{provider}': {detail}")]
    Auth {
        provider: &'static str,
        detail: String,
    },

    /// HTTP 400/404/422 — the request itself is malformed.
    #[error("request rejected by '{provider}': {detail}")]
    InvalidRequest {
        provider: &'static str,
        detail: String,
    },

    /// Any other non-success status (5xx and friends).
    #[error("'{provider}' returned HTTP {status}: {detail}")]
    Server {
        provider: &'static str,
        status: u16,
        detail: String,
    },

    /// A 2xx response that contained no usable content.
    #[error("empty response from '{provider}'")]
    EmptyResponse { provider: &'static str },
}

impl ProviderError {
    /// Whether the retry loop should try again after backing off.
    ///
    /// Rate limits, timeouts, transport failures, and server-side errors are
    /// transient. Authentication and malformed-request failures are not —
    /// nor is an empty 2xx body, which repeats deterministically.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Http(_)
                | ProviderError::RateLimited { .. }
                | ProviderError::Timeout { .. }
                | ProviderError::Server { .. }
        )
    }

    /// Server-requested retry delay, when one was supplied.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}
