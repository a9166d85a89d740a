//! Test-only mock provider.
//!
//! Scripts a sequence of generation outcomes and counts outbound calls so
//! tests can assert retry behaviour ("two rate limits then success → exactly
//! three calls") without any network. Embeddings are deterministic
//! feature-hash vectors, so retrieval ranking in tests reflects real token
//! overlap between query and chunk text.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{GenerationOptions, GenerationResponse, LlmProvider, ProviderError};

const EMBEDDING_DIM: usize = 64;

/// One scripted result for a `generate` call.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Succeed with this text.
    Reply(String),
    /// Fail transiently with a 429.
    RateLimited,
    /// Fail transiently with a 503.
    ServerError,
    /// Fail permanently with an auth error.
    AuthError,
}

/// Scriptable in-memory provider.
#[derive(Clone)]
pub struct MockProvider {
    script: Arc<Mutex<VecDeque<MockOutcome>>>,
    default_response: String,
    generate_calls: Arc<AtomicUsize>,
    embed_calls: Arc<AtomicUsize>,
    fail_embed: bool,
    delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            default_response: "mock response".into(),
            generate_calls: Arc::new(AtomicUsize::new(0)),
            embed_calls: Arc::new(AtomicUsize::new(0)),
            fail_embed: false,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    /// Provider that always replies with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            default_response: text.into(),
            ..Self::default()
        }
    }

    /// Provider that plays `outcomes` in order, then falls back to the
    /// default response.
    pub fn with_outcomes(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            script: Arc::new(Mutex::new(outcomes.into())),
            ..Self::default()
        }
    }

    /// Make every `embed` call fail with a server error.
    pub fn with_failing_embeddings(mut self) -> Self {
        self.fail_embed = true;
        self
    }

    /// Sleep this long before answering each `generate` call.
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Number of `generate` calls made so far.
    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    /// Number of `embed` calls made so far.
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

/// Deterministic feature-hash embedding: token → bucket, L2-normalised.
///
/// The same text always produces the same vector regardless of global state,
/// and texts sharing vocabulary score high cosine similarity.
pub(crate) fn hash_embedding(text: &str) -> Vec<f32> {
    let mut tf = vec![0.0f32; EMBEDDING_DIM];
    for token in text.split_whitespace() {
        let token: String = token
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        if token.is_empty() {
            continue;
        }
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        tf[(hasher.finish() as usize) % EMBEDDING_DIM] += 1.0;
    }
    let norm: f32 = tf.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut tf {
            *x /= norm;
        }
    }
    tf
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<GenerationResponse, ProviderError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }

        let outcome = self.script.lock().unwrap().pop_front();
        match outcome {
            None => Ok(GenerationResponse {
                text: self.default_response.clone(),
                prompt_tokens: 0,
                completion_tokens: 0,
            }),
            Some(MockOutcome::Reply(text)) => Ok(GenerationResponse {
                text,
                prompt_tokens: 0,
                completion_tokens: 0,
            }),
            Some(MockOutcome::RateLimited) => Err(ProviderError::RateLimited {
                provider: "mock",
                retry_after_secs: None,
            }),
            Some(MockOutcome::ServerError) => Err(ProviderError::Server {
                provider: "mock",
                status: 503,
                detail: "scripted failure".into(),
            }),
            Some(MockOutcome::AuthError) => Err(ProviderError::Auth {
                provider: "mock",
                detail: "scripted auth failure".into(),
            }),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embed {
            return Err(ProviderError::Server {
                provider: "mock",
                status: 503,
                detail: "scripted embed failure".into(),
            });
        }
        Ok(hash_embedding(text))
    }
}
