//! Retrieval: embed chunks once per document, then rank them per section
//! query by cosine similarity.
//!
//! Embeddings fan out over the provider with bounded concurrency. A chunk
//! whose embedding fails even after retries keeps `embedding: None` and
//! scores 0.0 — one flaky call must not abort a whole run. When *every*
//! embedding is missing the scores all tie and the ascending-sequence
//! tie-break degrades ranking to document order, which is the best
//! available fallback for a retrieval-less prompt.

use std::cmp::Ordering;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::pipeline::chunk::Chunk;
use crate::pipeline::llm;
use crate::provider::LlmProvider;

/// A chunk with its relevance score for one query.
#[derive(Debug, Clone)]
pub struct RankedChunk {
    pub score: f32,
    pub chunk: Chunk,
}

/// Compute and store an embedding for every chunk that doesn't have one.
///
/// Runs up to `config.embed_concurrency` provider calls in flight. Each
/// call goes through the transient-retry wrapper; a chunk that still fails
/// is skipped with a warning. Returns the number of embedded chunks.
pub async fn embed_chunks(
    provider: &Arc<dyn LlmProvider>,
    chunks: &mut [Chunk],
    config: &AnalysisConfig,
) -> usize {
    let inputs: Vec<(usize, String)> = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| (i, chunk.text.clone()))
        .collect();
    let results: Vec<(usize, Result<Vec<f32>, AnalysisError>)> =
        stream::iter(inputs.into_iter().map(|(i, text)| {
            let provider = Arc::clone(provider);
            async move { (i, llm::embed_with_retry(&provider, &text, config).await) }
        }))
        .buffered(config.embed_concurrency)
        .collect()
        .await;

    let mut embedded = 0usize;
    for (i, result) in results {
        match result {
            Ok(vector) => {
                chunks[i].embedding = Some(vector);
                embedded += 1;
            }
            Err(e) => {
                warn!("chunk {}: embedding failed, will score 0.0 — {}", i, e);
            }
        }
    }
    debug!("embedded {}/{} chunks", embedded, chunks.len());
    embedded
}

/// Rank chunks against a query vector and keep the top K.
///
/// Output is sorted by descending score, ties broken by ascending sequence
/// index so the ordering is fully deterministic. When the corpus already
/// fits inside K the chunks come back in original sequence order — ranking
/// a set that is returned whole adds nothing.
///
/// # Errors
///
/// `EmptyCorpus` when there are no chunks at all.
pub fn rank(
    chunks: &[Chunk],
    query_vector: &[f32],
    top_k: usize,
) -> Result<Vec<RankedChunk>, AnalysisError> {
    if chunks.is_empty() {
        return Err(AnalysisError::EmptyCorpus);
    }

    let score_of = |chunk: &Chunk| -> f32 {
        chunk
            .embedding
            .as_deref()
            .map(|e| cosine_similarity(query_vector, e))
            .unwrap_or(0.0)
    };

    if chunks.len() <= top_k {
        return Ok(chunks
            .iter()
            .map(|c| RankedChunk {
                score: score_of(c),
                chunk: c.clone(),
            })
            .collect());
    }

    let mut scored: Vec<RankedChunk> = chunks
        .iter()
        .map(|c| RankedChunk {
            score: score_of(c),
            chunk: c.clone(),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.chunk.seq.cmp(&b.chunk.seq))
    });
    scored.truncate(top_k);
    Ok(scored)
}

/// Cosine similarity between two vectors; 0.0 for zero or mismatched input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(seq: usize, embedding: Option<Vec<f32>>) -> Chunk {
        Chunk {
            seq,
            pages: (1, 1),
            text: format!("chunk {seq}"),
            embedding,
        }
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn empty_corpus_is_an_error() {
        let err = rank(&[], &[1.0, 0.0], 3).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyCorpus));
    }

    #[test]
    fn ranked_descending_with_seq_tie_break() {
        let chunks = vec![
            chunk(0, Some(vec![0.0, 1.0])),      // orthogonal → 0.0
            chunk(1, Some(vec![1.0, 0.0])),      // identical → 1.0
            chunk(2, Some(vec![1.0, 1.0])),      // 45° → ~0.707
            chunk(3, Some(vec![1.0, 0.0])),      // identical → 1.0, ties with 1
        ];
        let ranked = rank(&chunks, &[1.0, 0.0], 3).unwrap();

        let seqs: Vec<usize> = ranked.iter().map(|r| r.chunk.seq).collect();
        assert_eq!(seqs, vec![1, 3, 2], "ties broken by ascending seq");
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn output_length_is_min_of_k_and_corpus() {
        let chunks: Vec<Chunk> = (0..5)
            .map(|i| chunk(i, Some(vec![i as f32, 1.0])))
            .collect();
        assert_eq!(rank(&chunks, &[1.0, 0.0], 3).unwrap().len(), 3);
        assert_eq!(rank(&chunks, &[1.0, 0.0], 9).unwrap().len(), 5);
    }

    #[test]
    fn small_corpus_keeps_original_order() {
        let chunks = vec![
            chunk(0, Some(vec![0.0, 1.0])),
            chunk(1, Some(vec![1.0, 0.0])),
        ];
        let ranked = rank(&chunks, &[1.0, 0.0], 5).unwrap();
        let seqs: Vec<usize> = ranked.iter().map(|r| r.chunk.seq).collect();
        assert_eq!(seqs, vec![0, 1], "corpus within K stays in sequence order");
    }

    #[test]
    fn missing_embeddings_score_zero_and_fall_back_to_sequence_order() {
        let chunks: Vec<Chunk> = (0..4).map(|i| chunk(i, None)).collect();
        let ranked = rank(&chunks, &[1.0, 0.0], 2).unwrap();
        let seqs: Vec<usize> = ranked.iter().map(|r| r.chunk.seq).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert!(ranked.iter().all(|r| r.score == 0.0));
    }

    #[tokio::test]
    async fn embed_chunks_fills_embeddings() {
        use crate::provider::MockProvider;

        let provider: Arc<dyn LlmProvider> = Arc::new(MockProvider::default());
        let config = AnalysisConfig::builder()
            .provider(Arc::clone(&provider))
            .build()
            .unwrap();

        let mut chunks: Vec<Chunk> = (0..5).map(|i| chunk(i, None)).collect();
        let embedded = embed_chunks(&provider, &mut chunks, &config).await;

        assert_eq!(embedded, 5);
        assert!(chunks.iter().all(|c| c.embedding.is_some()));
    }

    #[tokio::test]
    async fn embed_chunks_skips_failures() {
        use crate::provider::MockProvider;

        let provider: Arc<dyn LlmProvider> =
            Arc::new(MockProvider::default().with_failing_embeddings());
        let config = AnalysisConfig::builder()
            .provider(Arc::clone(&provider))
            .max_retries(0)
            .retry_backoff_ms(1)
            .build()
            .unwrap();

        let mut chunks: Vec<Chunk> = (0..3).map(|i| chunk(i, None)).collect();
        let embedded = embed_chunks(&provider, &mut chunks, &config).await;

        assert_eq!(embedded, 0);
        assert!(chunks.iter().all(|c| c.embedding.is_none()));
    }
}
