//! Top-level analysis entry points.
//!
//! [`analyze`] is the primary API: raw PDF bytes in, ordered analysis
//! sections out. [`analyze_pages`] and [`analyze_text`] skip the extraction
//! stage for callers that already hold text (and for offline tests);
//! [`analyze_file`] and [`analyze_sync`] are conveniences in the same shape.
//!
//! One call = one sequential pipeline run. Runs for different documents may
//! execute concurrently on separate tasks — every run owns its document and
//! chunk set outright, and the optional [`AnalysisCache`] is the only shared
//! structure (single-flight per content hash, so concurrent identical
//! uploads cost one model call).

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, info};

use crate::cache::AnalysisCache;
use crate::config::{AnalysisConfig, DocumentType};
use crate::document::{Document, PageText};
use crate::error::AnalysisError;
use crate::output::{AnalysisOutput, AnalysisResult, RunRecord, RunStats};
use crate::pipeline::{chunk, compose, extract, format, llm, retrieve};
use crate::prompts;
use crate::provider::gemini::{DEFAULT_EMBED_MODEL, DEFAULT_MODEL};
use crate::provider::{GeminiProvider, LlmProvider};

/// Analyze a PDF document.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `bytes` — Raw PDF bytes
/// * `document_type` — Which instruction template to analyze against
/// * `config` — Pipeline configuration
///
/// # Errors
///
/// Every failure is terminal for the run: `UnreadableDocument` for bad
/// input, `EmptyCorpus` for text-free documents, `ModelRequestRejected` /
/// `ModelUnavailable` from the model stage, `UnparseableResponse` for an
/// empty model reply.
pub async fn analyze(
    bytes: &[u8],
    document_type: DocumentType,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let document = Document::from_bytes(bytes.to_vec())?;
    analyze_document(document, None, document_type, config).await
}

/// Analyze already-extracted pages (no PDF parsing).
pub async fn analyze_pages(
    pages: Vec<PageText>,
    document_type: DocumentType,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let joined: String = pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let document = Document::from_text(&joined);
    analyze_document(document, Some(pages), document_type, config).await
}

/// Analyze a plain-text document (single implicit page).
pub async fn analyze_text(
    text: &str,
    document_type: DocumentType,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    analyze_pages(
        vec![PageText {
            number: 1,
            text: text.to_string(),
        }],
        document_type,
        config,
    )
    .await
}

/// Analyze a PDF file on disk.
pub async fn analyze_file(
    path: impl AsRef<Path>,
    document_type: DocumentType,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AnalysisError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            AnalysisError::Internal(format!("reading '{}': {e}", path.display()))
        }
    })?;
    analyze(&bytes, document_type, config).await
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    bytes: &[u8],
    document_type: DocumentType,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AnalysisError::Internal(format!("failed to create tokio runtime: {e}")))?
        .block_on(analyze(bytes, document_type, config))
}

// ── Internal orchestration ───────────────────────────────────────────────

/// Run the pipeline for a prepared document, going through the cache when
/// one is configured, and record run metadata on success.
async fn analyze_document(
    document: Document,
    pages: Option<Vec<PageText>>,
    document_type: DocumentType,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let total_start = Instant::now();
    let provider = resolve_provider(config)?;
    let hash = document.content_hash().to_string();
    info!(
        "starting analysis: {} ({}, {} bytes)",
        &hash[..12],
        document_type,
        document.bytes().len()
    );

    let (result, stats) = match config.cache {
        Some(ref cache) => run_through_cache(
            Arc::clone(cache),
            &hash,
            &document,
            pages,
            document_type,
            config,
            &provider,
            total_start,
        )
        .await?,
        None => {
            let (result, mut stats) =
                run_pipeline(&document, pages, document_type, config, &provider).await?;
            stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
            (result, stats)
        }
    };

    if let Some(ref recorder) = config.recorder {
        recorder.record(&RunRecord {
            content_hash: hash,
            document_type,
            section_count: result.len(),
            cache_hit: stats.cache_hit,
            stats: stats.clone(),
        });
    }

    info!(
        "analysis complete: {} sections, {}ms total{}",
        result.len(),
        stats.total_duration_ms,
        if stats.cache_hit { " (cache hit)" } else { "" }
    );

    Ok(AnalysisOutput { result, stats })
}

/// Single-flight wrapper: one pipeline run per content hash, shared by all
/// concurrent callers; losers get the winner's result with hit-flagged stats.
#[allow(clippy::too_many_arguments)]
async fn run_through_cache(
    cache: Arc<AnalysisCache>,
    hash: &str,
    document: &Document,
    pages: Option<Vec<PageText>>,
    document_type: DocumentType,
    config: &AnalysisConfig,
    provider: &Arc<dyn LlmProvider>,
    total_start: Instant,
) -> Result<(AnalysisResult, RunStats), AnalysisError> {
    // The winner parks its stats here; hitters build their own.
    let stats_slot: Arc<Mutex<Option<RunStats>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&stats_slot);

    let (result, hit) = cache
        .get_or_run(hash, || async move {
            let (result, stats) =
                run_pipeline(document, pages, document_type, config, provider).await?;
            *slot.lock().expect("stats slot poisoned") = Some(stats);
            Ok(result)
        })
        .await?;

    let mut stats = stats_slot
        .lock()
        .expect("stats slot poisoned")
        .take()
        .unwrap_or_else(|| RunStats {
            cache_hit: true,
            ..RunStats::default()
        });
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    // A caller that awaited someone else's run is a hit too.
    stats.cache_hit = hit || stats.cache_hit;
    Ok((result, stats))
}

/// The six pipeline stages, in order. No caching, no recording — just the
/// transformation.
async fn run_pipeline(
    document: &Document,
    pages: Option<Vec<PageText>>,
    document_type: DocumentType,
    config: &AnalysisConfig,
    provider: &Arc<dyn LlmProvider>,
) -> Result<(AnalysisResult, RunStats), AnalysisError> {
    // ── Step 1: Extract text ─────────────────────────────────────────────
    let extract_start = Instant::now();
    let pages = match pages {
        Some(pages) => pages,
        None => extract::extract_pages(document.bytes()).await?,
    };
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    debug!("extracted {} pages in {}ms", pages.len(), extract_duration_ms);

    // ── Step 2: Chunk ────────────────────────────────────────────────────
    let chunk_config = chunk::ChunkConfig {
        max_chars: config.max_chunk_chars,
        overlap_chars: config.overlap_chars,
    };
    let mut chunks = chunk::split_pages(&pages, &chunk_config)?;
    if chunks.is_empty() {
        return Err(AnalysisError::EmptyCorpus);
    }
    debug!("chunked into {} segments", chunks.len());

    // ── Step 3: Embed + retrieve per section ─────────────────────────────
    let retrieval_start = Instant::now();
    let embedded_chunks = retrieve::embed_chunks(provider, &mut chunks, config).await;

    let queries = prompts::section_queries(document_type);
    let mut sections = Vec::with_capacity(queries.len());
    for query in queries {
        let query_vector = llm::embed_with_retry(provider, &query, config).await?;
        let ranked = retrieve::rank(&chunks, &query_vector, config.top_k)?;
        sections.push(compose::SectionContext {
            query,
            chunks: ranked,
        });
    }
    let retrieval_duration_ms = retrieval_start.elapsed().as_millis() as u64;

    // ── Step 4: Compose prompt ───────────────────────────────────────────
    let prompt = compose::build_prompt(document_type, &sections, config);
    debug!(
        "composed prompt: ~{} tokens, {} chunks",
        prompt.estimated_tokens, prompt.included_chunks
    );

    // ── Step 5: Model call ───────────────────────────────────────────────
    let model_start = Instant::now();
    let (response, retries) = llm::generate_with_retry(provider, &prompt.text, config).await?;
    let model_duration_ms = model_start.elapsed().as_millis() as u64;

    // ── Step 6: Format result ────────────────────────────────────────────
    let result = format::parse_sections(&response.text)?;

    let stats = RunStats {
        page_count: pages.len(),
        chunk_count: chunks.len(),
        embedded_chunks,
        prompt_chunks: prompt.included_chunks,
        prompt_tokens_estimate: prompt.estimated_tokens,
        input_tokens: response.prompt_tokens,
        output_tokens: response.completion_tokens,
        retries,
        cache_hit: false,
        total_duration_ms: 0, // filled by the caller
        extract_duration_ms,
        retrieval_duration_ms,
        model_duration_ms,
    };

    Ok((result, stats))
}

/// Resolve the model provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — the caller constructed
///    and configured it entirely; used as-is. This is also the test seam.
/// 2. **Environment** — a Gemini client from `GEMINI_API_KEY` /
///    `GOOGLE_API_KEY`, with the configured (or default) model names.
fn resolve_provider(config: &AnalysisConfig) -> Result<Arc<dyn LlmProvider>, AnalysisError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
    let embed_model = config.embed_model.as_deref().unwrap_or(DEFAULT_EMBED_MODEL);
    GeminiProvider::from_env(model, embed_model)
        .map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
        .ok_or_else(|| {
            AnalysisError::InvalidConfiguration(
                "no model provider configured.\n\
                 Set GEMINI_API_KEY or GOOGLE_API_KEY, or inject one with \
                 AnalysisConfig::builder().provider(...)."
                    .into(),
            )
        })
}
