//! Gemini provider: `generateContent` for analysis text,
//! `embedContent` for retrieval vectors.
//!
//! Plain reqwest + serde wire structs against the v1beta REST surface.
//! Retry and timeout policy live in [`crate::pipeline::llm`]; this module
//! only translates one request into one classified result.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerationOptions, GenerationResponse, LlmProvider, ProviderError};

/// Default generation model, matching the hosted analyzer.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-004";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const PROVIDER: &str = "gemini";

/// Gemini REST client.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    embed_model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        embed_model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            embed_model: embed_model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Build from `GEMINI_API_KEY` or `GOOGLE_API_KEY`.
    ///
    /// Returns `None` when neither variable is set; the caller decides how
    /// to report that (the pipeline maps it to a configuration error).
    pub fn from_env(model: &str, embed_model: &str) -> Option<Self> {
        let key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty())?;
        Some(Self::new(key, model, embed_model))
    }

    /// Point the client at a different endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
}

#[derive(Deserialize)]
struct GenerateReply {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Deserialize)]
struct ReplyPart {
    text: Option<String>,
}

#[derive(Deserialize, Default)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: usize,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Deserialize)]
struct EmbedReply {
    embedding: Option<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

// ── Calls ────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
            }),
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let reply: GenerateReply = response.json().await?;
        let usage = reply.usage_metadata.unwrap_or_default();
        let text: String = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse { provider: PROVIDER });
        }

        debug!(
            prompt_tokens = usage.prompt_token_count,
            completion_tokens = usage.candidates_token_count,
            "gemini generation complete"
        );

        Ok(GenerationResponse {
            text,
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/models/{}:embedContent", self.base_url, self.embed_model);
        let model_path = format!("models/{}", self.embed_model);
        let body = EmbedRequest {
            model: &model_path,
            content: Content {
                parts: vec![Part { text }],
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let reply: EmbedReply = response.json().await?;
        match reply.embedding {
            Some(e) if !e.values.is_empty() => Ok(e.values),
            _ => Err(ProviderError::EmptyResponse { provider: PROVIDER }),
        }
    }
}

/// Map a non-success status onto the provider error taxonomy.
///
/// Reads the body for diagnostic detail (truncated — Gemini error bodies can
/// embed the full offending request).
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after_secs = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());

    let mut detail = response.text().await.unwrap_or_default();
    if detail.len() > 500 {
        detail.truncate(500);
    }

    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited {
            provider: PROVIDER,
            retry_after_secs,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth {
            provider: PROVIDER,
            detail,
        },
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderError::InvalidRequest {
                provider: PROVIDER,
                detail,
            }
        }
        s => ProviderError::Server {
            provider: PROVIDER,
            status: s.as_u16(),
            detail,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_request_serialises_camel_case() {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: "hello" }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: Some(0.9),
                max_output_tokens: Some(2048),
            }),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"generationConfig\""));
        assert!(json.contains("\"maxOutputTokens\":2048"));
        assert!(json.contains("\"text\":\"hello\""));
    }

    #[test]
    fn generate_reply_parses_candidate_text() {
        let json = r###"{
            "candidates": [{"content": {"parts": [{"text": "## Summary\nGood deck."}]}}],
            "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 40}
        }"###;
        let reply: GenerateReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.candidates.len(), 1);
        let usage = reply.usage_metadata.unwrap();
        assert_eq!(usage.prompt_token_count, 120);
        assert_eq!(usage.candidates_token_count, 40);
    }

    #[test]
    fn embed_reply_parses_values() {
        let json = r#"{"embedding": {"values": [0.1, -0.2, 0.3]}}"#;
        let reply: EmbedReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.embedding.unwrap().values.len(), 3);
    }

    #[test]
    fn from_env_absent_returns_none() {
        // Serialised test environments may set the real key; skip if so.
        if std::env::var("GEMINI_API_KEY").is_ok() || std::env::var("GOOGLE_API_KEY").is_ok() {
            return;
        }
        assert!(GeminiProvider::from_env(DEFAULT_MODEL, DEFAULT_EMBED_MODEL).is_none());
    }

    /// Minimal HTTP server returning one fixed response per connection.
    async fn spawn_mock_server(responses: Vec<&'static str>) -> u16 {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            for resp in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let (reader, mut writer) = stream.split();
                    let mut buf_reader = BufReader::new(reader);
                    let mut line = String::new();
                    let mut content_length = 0usize;
                    loop {
                        line.clear();
                        buf_reader.read_line(&mut line).await.unwrap_or(0);
                        if let Some(v) = line
                            .to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(str::trim)
                            .and_then(|v| v.parse::<usize>().ok())
                        {
                            content_length = v;
                        }
                        if line == "\r\n" || line == "\n" || line.is_empty() {
                            break;
                        }
                    }
                    // Drain the request body so the client doesn't see a reset.
                    let mut body = vec![0u8; content_length];
                    use tokio::io::AsyncReadExt;
                    let _ = buf_reader.read_exact(&mut body).await;
                    writer.write_all(resp.as_bytes()).await.ok();
                });
            }
        });

        port
    }

    fn provider_for(port: u16) -> GeminiProvider {
        GeminiProvider::new("test-key", DEFAULT_MODEL, DEFAULT_EMBED_MODEL)
            .with_base_url(format!("http://127.0.0.1:{port}"))
    }

    #[tokio::test]
    async fn generate_happy_path() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}],"usageMetadata":{"promptTokenCount":3,"candidatesTokenCount":1}}"#;
        let resp: &'static str = Box::leak(
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            )
            .into_boxed_str(),
        );
        let port = spawn_mock_server(vec![resp]).await;

        let out = provider_for(port)
            .generate("hello", &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(out.text, "ok");
        assert_eq!(out.prompt_tokens, 3);
    }

    #[tokio::test]
    async fn rate_limit_maps_with_retry_after() {
        let resp = "HTTP/1.1 429 Too Many Requests\r\nRetry-After: 9\r\nContent-Length: 0\r\n\r\n";
        let port = spawn_mock_server(vec![resp]).await;

        let err = provider_for(port).embed("hello").await.unwrap_err();
        match err {
            ProviderError::RateLimited {
                retry_after_secs, ..
            } => assert_eq!(retry_after_secs, Some(9)),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn auth_failure_is_not_transient() {
        let resp = "HTTP/1.1 403 Forbidden\r\nContent-Length: 6\r\n\r\nno key";
        let port = spawn_mock_server(vec![resp]).await;

        let err = provider_for(port)
            .generate("hello", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Auth { .. }));
        assert!(!err.is_transient());
    }
}
