//! Model interaction: drive provider calls with retry, backoff, and timeout.
//!
//! This module is intentionally thin — all prompt engineering lives in
//! [`crate::prompts`] and [`crate::pipeline::compose`] so it can change
//! without touching retry or error-handling logic here.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 5xx / timeout failures are transient and frequent under
//! concurrent load. Exponential backoff (`retry_backoff_ms * 2^(attempt-1)`)
//! avoids thundering-herd: with 500 ms base and 3 retries the wait sequence
//! is 500 ms → 1 s → 2 s. A server-supplied `Retry-After` overrides the
//! computed delay. Non-transient failures (auth, malformed request) abort
//! immediately — retrying a bad API key only burns quota.
//!
//! ## Cancellation
//!
//! Every call runs under `tokio::time::timeout`, and dropping the returned
//! future (e.g. when the enclosing request is aborted) cancels the in-flight
//! HTTP call with it.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::time::{sleep, timeout, Duration};
use tracing::warn;

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::provider::{GenerationOptions, GenerationResponse, LlmProvider, ProviderError};

/// Run the generation call for a composed prompt.
///
/// Returns the raw response and the number of retries consumed.
pub async fn generate_with_retry(
    provider: &Arc<dyn LlmProvider>,
    prompt: &str,
    config: &AnalysisConfig,
) -> Result<(GenerationResponse, u32), AnalysisError> {
    let options = GenerationOptions {
        temperature: Some(config.temperature),
        max_output_tokens: Some(config.max_output_tokens),
    };
    with_retry(provider.name(), config, || {
        let provider = Arc::clone(provider);
        let prompt = prompt.to_string();
        let options = options.clone();
        async move { provider.generate(&prompt, &options).await }
    })
    .await
}

/// Run an embedding call under the same retry/timeout policy.
pub async fn embed_with_retry(
    provider: &Arc<dyn LlmProvider>,
    text: &str,
    config: &AnalysisConfig,
) -> Result<Vec<f32>, AnalysisError> {
    let (vector, _) = with_retry(provider.name(), config, || {
        let provider = Arc::clone(provider);
        let text = text.to_string();
        async move { provider.embed(&text).await }
    })
    .await?;
    Ok(vector)
}

/// Shared retry loop: call `f` until it succeeds, a non-transient error
/// appears, or the retry budget runs out.
///
/// Attempt 0 is the initial call; `config.max_retries` more may follow, so
/// `max_retries = 3` means at most 4 outbound calls.
async fn with_retry<T, F, Fut>(
    provider_name: &str,
    config: &AnalysisConfig,
    mut f: F,
) -> Result<(T, u32), AnalysisError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut last_err: Option<ProviderError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = last_err
                .as_ref()
                .and_then(ProviderError::retry_after)
                .unwrap_or_else(|| backoff_delay(config.retry_backoff_ms, attempt));
            warn!(
                "{}: retry {}/{} after {}ms",
                provider_name,
                attempt,
                config.max_retries,
                delay.as_millis()
            );
            sleep(delay).await;
        }

        match call_with_timeout(f(), config.api_timeout_secs).await {
            Ok(value) => return Ok((value, attempt)),
            Err(e) if e.is_transient() => {
                warn!("{}: attempt {} failed — {}", provider_name, attempt + 1, e);
                last_err = Some(e);
            }
            Err(e) => {
                return Err(AnalysisError::ModelRequestRejected {
                    provider: provider_name.to_string(),
                    source: e,
                });
            }
        }
    }

    Err(AnalysisError::ModelUnavailable {
        attempts: config.max_retries + 1,
        source: last_err.unwrap_or(ProviderError::EmptyResponse { provider: "unknown" }),
    })
}

/// Exponential backoff: `base * 2^(attempt-1)`, capped so the shift cannot
/// overflow on absurd retry counts.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64 << (attempt.saturating_sub(1)).min(16);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

async fn call_with_timeout<T>(
    fut: impl Future<Output = Result<T, ProviderError>>,
    timeout_secs: u64,
) -> Result<T, ProviderError> {
    let start = Instant::now();
    match timeout(Duration::from_secs(timeout_secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            elapsed_ms: start.elapsed().as_millis() as u64,
        }),
    }
}
