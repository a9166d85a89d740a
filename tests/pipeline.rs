//! Offline integration tests for the full analysis pipeline.
//!
//! Everything here runs against [`MockProvider`] through the text entry
//! points — no network, no API key, no pdfium binary — so the suite is safe
//! for CI. Live PDF + live API coverage lives in `tests/e2e.rs` behind an
//! environment gate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use deck2insight::{
    analyze, analyze_text, AnalysisCache, AnalysisConfig, AnalysisError, DocumentType,
    LlmProvider, MockOutcome, MockProvider, RunRecord, RunRecorder,
};

// ── Test helpers ─────────────────────────────────────────────────────────

/// A few paragraphs of deck-like text, long enough to produce several
/// chunks at the default window size.
fn sample_text() -> String {
    let paragraphs = [
        "Acme Robotics builds warehouse automation for mid-size logistics \
         operators. The product is a retrofit kit that converts manual \
         forklifts into autonomous pallet movers within two days of install.",
        "Market opportunity: the warehouse automation market has a TAM of \
         $4B growing at 18% CAGR. Our serviceable market covers 12,000 \
         mid-size warehouses in North America and Europe.",
        "Business model: hardware margin of 35% plus a $1,200 per-vehicle \
         monthly subscription. Unit economics show LTV of $86k against a \
         CAC of $9k with an 11-month payback period.",
        "Traction: 14 paying customers, $120k MRR, 40% month-over-month \
         growth for the last two quarters, and a signed LOI with a top-3 \
         third-party logistics provider.",
        "Financial highlights: we project $8M ARR in year two with a burn \
         rate of $180k per month and 20 months of runway after this round.",
        "Investment ask: $5M seed round. Use of funds: 60% engineering, \
         25% go-to-market, 15% working capital for hardware inventory.",
    ];
    paragraphs.join("\n\n")
}

const CANNED_ANALYSIS: &str = "\
Overall, a focused and credible pitch with unusually strong unit economics.

## Executive Summary
Acme retrofits forklifts into autonomous movers; $120k MRR growing 40% MoM.

## Market Opportunity
TAM of $4B at 18% CAGR; 12,000 serviceable warehouses.

## Financial Highlights
Projected $8M ARR in year two; $180k monthly burn with 20 months runway.

## Risk Assessment
Hardware inventory ties up working capital; key-person risk on the CTO.
";

fn config_with(provider: &MockProvider) -> AnalysisConfig {
    AnalysisConfig::builder()
        .provider(Arc::new(provider.clone()))
        .max_chunk_chars(400)
        .overlap_chars(50)
        .retry_backoff_ms(1)
        .build()
        .unwrap()
}

struct CapturingRecorder {
    records: Mutex<Vec<RunRecord>>,
}

impl RunRecorder for CapturingRecorder {
    fn record(&self, record: &RunRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

// ── Happy path ───────────────────────────────────────────────────────────

#[tokio::test]
async fn full_pipeline_produces_ordered_sections() {
    let mock = MockProvider::replying(CANNED_ANALYSIS);
    let config = config_with(&mock);

    let output = analyze_text(&sample_text(), DocumentType::PitchDeck, &config)
        .await
        .unwrap();

    let names: Vec<&str> = output
        .result
        .sections()
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "Summary",
            "Executive Summary",
            "Market Opportunity",
            "Financial Highlights",
            "Risk Assessment"
        ],
        "leading prose becomes Summary; the rest follow in display order"
    );
    assert!(output
        .result
        .get("Market Opportunity")
        .unwrap()
        .contains("$4B"));

    // One generation call; one embedding per chunk plus one per section query.
    assert_eq!(mock.generate_calls(), 1);
    let stats = &output.stats;
    assert!(stats.chunk_count >= 2, "sample text should multi-chunk");
    assert_eq!(stats.embedded_chunks, stats.chunk_count);
    assert!(stats.prompt_chunks > 0);
    assert_eq!(stats.retries, 0);
    assert!(!stats.cache_hit);
    assert_eq!(
        mock.embed_calls(),
        stats.chunk_count + output_queries(DocumentType::PitchDeck)
    );
}

fn output_queries(doc_type: DocumentType) -> usize {
    deck2insight::prompts::section_queries(doc_type).len()
}

#[tokio::test]
async fn prompt_budget_is_respected() {
    let mock = MockProvider::replying(CANNED_ANALYSIS);
    let config = AnalysisConfig::builder()
        .provider(Arc::new(mock.clone()))
        .max_prompt_tokens(700)
        .build()
        .unwrap();

    let output = analyze_text(&sample_text(), DocumentType::PitchDeck, &config)
        .await
        .unwrap();
    assert!(
        output.stats.prompt_tokens_estimate <= 700,
        "estimate {} exceeds budget",
        output.stats.prompt_tokens_estimate
    );
}

// ── Retry behaviour ──────────────────────────────────────────────────────

#[tokio::test]
async fn two_rate_limits_then_success_records_three_calls() {
    let mock = MockProvider::with_outcomes(vec![
        MockOutcome::RateLimited,
        MockOutcome::RateLimited,
        MockOutcome::Reply(CANNED_ANALYSIS.into()),
    ]);
    let config = AnalysisConfig::builder()
        .provider(Arc::new(mock.clone()))
        .max_retries(3)
        .retry_backoff_ms(1)
        .build()
        .unwrap();

    let output = analyze_text(&sample_text(), DocumentType::BusinessAnalysis, &config)
        .await
        .unwrap();

    assert_eq!(mock.generate_calls(), 3, "exactly three outbound calls");
    assert_eq!(output.stats.retries, 2);
    assert!(!output.result.is_empty());
}

#[tokio::test]
async fn auth_failure_rejects_without_retrying() {
    let mock = MockProvider::with_outcomes(vec![MockOutcome::AuthError]);
    let config = AnalysisConfig::builder()
        .provider(Arc::new(mock.clone()))
        .max_retries(5)
        .retry_backoff_ms(1)
        .build()
        .unwrap();

    let err = analyze_text(&sample_text(), DocumentType::PitchDeck, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::ModelRequestRejected { .. }));
    assert_eq!(mock.generate_calls(), 1);
}

#[tokio::test]
async fn exhausted_retries_are_model_unavailable() {
    let mock = MockProvider::with_outcomes(vec![
        MockOutcome::ServerError,
        MockOutcome::RateLimited,
    ]);
    let config = AnalysisConfig::builder()
        .provider(Arc::new(mock.clone()))
        .max_retries(1)
        .retry_backoff_ms(1)
        .build()
        .unwrap();

    let err = analyze_text(&sample_text(), DocumentType::PitchDeck, &config)
        .await
        .unwrap_err();
    match err {
        AnalysisError::ModelUnavailable { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("expected ModelUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_model_reply_is_unparseable() {
    let mock = MockProvider::replying("");
    let config = config_with(&mock);

    let err = analyze_text(&sample_text(), DocumentType::PitchDeck, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::UnparseableResponse));
}

// ── Input validation ─────────────────────────────────────────────────────

#[tokio::test]
async fn non_pdf_bytes_are_unreadable() {
    let mock = MockProvider::default();
    let config = config_with(&mock);

    let err = analyze(b"not a pdf at all", DocumentType::PitchDeck, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::UnreadableDocument { .. }));
    assert_eq!(mock.generate_calls() + mock.embed_calls(), 0);
}

#[tokio::test]
async fn missing_file_is_file_not_found() {
    let mock = MockProvider::default();
    let config = config_with(&mock);

    let err = deck2insight::analyze_file(
        "/definitely/not/a/real/path.pdf",
        DocumentType::PitchDeck,
        &config,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AnalysisError::FileNotFound { .. }));
}

#[tokio::test]
async fn file_with_wrong_magic_is_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not_a_deck.pdf");
    std::fs::write(&path, b"<html>surprise</html>").unwrap();

    let mock = MockProvider::default();
    let config = config_with(&mock);

    let err = deck2insight::analyze_file(&path, DocumentType::PitchDeck, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::UnreadableDocument { .. }));
}

#[tokio::test]
async fn invalid_overlap_rejected_at_build_time() {
    let err = AnalysisConfig::builder()
        .max_chunk_chars(100)
        .overlap_chars(100)
        .build()
        .unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidConfiguration(_)));
}

// ── Recording ────────────────────────────────────────────────────────────

#[tokio::test]
async fn recorder_receives_one_record_per_run() {
    let mock = MockProvider::replying(CANNED_ANALYSIS);
    let recorder = Arc::new(CapturingRecorder {
        records: Mutex::new(Vec::new()),
    });
    let config = AnalysisConfig::builder()
        .provider(Arc::new(mock.clone()))
        .recorder(Arc::clone(&recorder) as Arc<dyn RunRecorder>)
        .build()
        .unwrap();

    analyze_text(&sample_text(), DocumentType::PitchDeck, &config)
        .await
        .unwrap();

    let records = recorder.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].document_type, DocumentType::PitchDeck);
    assert!(!records[0].cache_hit);
    assert!(records[0].section_count > 0);
    assert_eq!(records[0].content_hash.len(), 64);
}

// ── Caching ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn identical_reupload_hits_the_cache() {
    let mock = MockProvider::replying(CANNED_ANALYSIS);
    let cache = Arc::new(AnalysisCache::new());
    let recorder = Arc::new(CapturingRecorder {
        records: Mutex::new(Vec::new()),
    });
    let config = AnalysisConfig::builder()
        .provider(Arc::new(mock.clone()))
        .cache(Arc::clone(&cache))
        .recorder(Arc::clone(&recorder) as Arc<dyn RunRecorder>)
        .build()
        .unwrap();

    let first = analyze_text(&sample_text(), DocumentType::PitchDeck, &config)
        .await
        .unwrap();
    let second = analyze_text(&sample_text(), DocumentType::PitchDeck, &config)
        .await
        .unwrap();

    assert_eq!(mock.generate_calls(), 1, "second run reused the result");
    assert_eq!(first.result, second.result);
    assert!(!first.stats.cache_hit);
    assert!(second.stats.cache_hit);

    // Both runs are recorded, distinguished by the hit flag.
    let records = recorder.records.lock().unwrap();
    assert_eq!(records.len(), 2);
    assert!(!records[0].cache_hit);
    assert!(records[1].cache_hit);
}

#[tokio::test]
async fn concurrent_identical_uploads_share_one_model_call() {
    let mock = MockProvider::replying(CANNED_ANALYSIS).with_delay(100);
    let cache = Arc::new(AnalysisCache::new());
    let config = AnalysisConfig::builder()
        .provider(Arc::new(mock.clone()))
        .cache(Arc::clone(&cache))
        .build()
        .unwrap();

    let text = sample_text();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let config = config.clone();
        let text = text.clone();
        handles.push(tokio::spawn(async move {
            analyze_text(&text, DocumentType::PitchDeck, &config)
                .await
                .unwrap()
        }));
    }

    let mut outputs = Vec::new();
    for handle in handles {
        outputs.push(handle.await.unwrap());
    }

    assert_eq!(
        mock.generate_calls(),
        1,
        "single-flight: the model ran once for four concurrent identical uploads"
    );
    assert!(outputs.windows(2).all(|w| w[0].result == w[1].result));
    assert_eq!(
        outputs.iter().filter(|o| o.stats.cache_hit).count(),
        3,
        "one winner, three hitters"
    );
}

#[tokio::test]
async fn different_documents_do_not_share_cache_entries() {
    let mock = MockProvider::replying(CANNED_ANALYSIS);
    let cache = Arc::new(AnalysisCache::new());
    let config = AnalysisConfig::builder()
        .provider(Arc::new(mock.clone()))
        .cache(Arc::clone(&cache))
        .build()
        .unwrap();

    analyze_text(&sample_text(), DocumentType::PitchDeck, &config)
        .await
        .unwrap();
    analyze_text(
        &format!("{}\n\nAn extra closing paragraph.", sample_text()),
        DocumentType::PitchDeck,
        &config,
    )
    .await
    .unwrap();

    assert_eq!(mock.generate_calls(), 2);
    assert_eq!(cache.len().await, 2);
}

// ── Degraded retrieval ───────────────────────────────────────────────────

#[tokio::test]
async fn query_embedding_failure_is_terminal() {
    let mock = MockProvider::default().with_failing_embeddings();
    let config = AnalysisConfig::builder()
        .provider(Arc::new(mock.clone()))
        .max_retries(0)
        .retry_backoff_ms(1)
        .build()
        .unwrap();

    // Chunk embeddings fail softly, but the first section query's embedding
    // failing after retries ends the run.
    let err = analyze_text(&sample_text(), DocumentType::PitchDeck, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::ModelUnavailable { .. }));
}

// ── Trait-object ergonomics ──────────────────────────────────────────────

#[tokio::test]
async fn provider_is_injected_as_trait_object() {
    let provider: Arc<dyn LlmProvider> = Arc::new(MockProvider::replying(CANNED_ANALYSIS));
    let config = AnalysisConfig::builder()
        .provider(provider)
        .build()
        .unwrap();

    let output = analyze_text(&sample_text(), DocumentType::FinancialModel, &config)
        .await
        .unwrap();
    assert!(!output.result.is_empty());
}

#[tokio::test]
async fn recorder_failures_never_fail_the_run() {
    struct PanickyButQuiet {
        calls: AtomicUsize,
    }
    impl RunRecorder for PanickyButQuiet {
        fn record(&self, _record: &RunRecord) {
            // A real sink would log its own I/O error here; the contract is
            // simply that it returns.
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    let recorder = Arc::new(PanickyButQuiet {
        calls: AtomicUsize::new(0),
    });
    let config = AnalysisConfig::builder()
        .provider(Arc::new(MockProvider::replying(CANNED_ANALYSIS)))
        .recorder(Arc::clone(&recorder) as Arc<dyn RunRecorder>)
        .build()
        .unwrap();

    analyze_text(&sample_text(), DocumentType::PitchDeck, &config)
        .await
        .unwrap();
    assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
}
