//! Output types: the analysis result, per-run statistics, and the record
//! handed to the persistence seam.

use crate::config::DocumentType;
use serde::{Deserialize, Serialize};

/// One named section of the analysis, e.g. "Market Opportunity".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSection {
    pub name: String,
    pub content: String,
}

/// The complete analysis: an ordered list of named sections.
///
/// Insertion order is display order. The value is immutable once the
/// formatter has produced it — there is no public mutator — so cached
/// results can be cloned out to concurrent callers safely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    sections: Vec<AnalysisSection>,
}

impl AnalysisResult {
    pub(crate) fn new(sections: Vec<AnalysisSection>) -> Self {
        Self { sections }
    }

    /// Sections in display order.
    pub fn sections(&self) -> &[AnalysisSection] {
        &self.sections
    }

    /// Content of the first section with this name, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.content.as_str())
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Render the sections back to Markdown for display or file output.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push_str("## ");
            out.push_str(&section.name);
            out.push_str("\n\n");
            out.push_str(&section.content);
            out.push_str("\n\n");
        }
        let trimmed = out.trim_end();
        if trimmed.is_empty() {
            String::from("\n")
        } else {
            format!("{trimmed}\n")
        }
    }
}

/// Statistics for a single analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Pages the extractor produced.
    pub page_count: usize,
    /// Chunks the chunker produced.
    pub chunk_count: usize,
    /// Chunks that received an embedding (the rest score 0.0).
    pub embedded_chunks: usize,
    /// Chunks that made it into the composed prompt.
    pub prompt_chunks: usize,
    /// Estimated token size of the composed prompt.
    pub prompt_tokens_estimate: usize,
    /// Input tokens reported by the provider (0 if unreported).
    pub input_tokens: usize,
    /// Output tokens reported by the provider (0 if unreported).
    pub output_tokens: usize,
    /// Transient-failure retries the generation call consumed.
    pub retries: u32,
    /// Whether the result came from the cache (no model call this run).
    pub cache_hit: bool,
    /// Wall-clock duration of the whole run.
    pub total_duration_ms: u64,
    /// Time spent in PDF text extraction.
    pub extract_duration_ms: u64,
    /// Time spent embedding and ranking chunks.
    pub retrieval_duration_ms: u64,
    /// Time spent in the generation call (including retries and backoff).
    pub model_duration_ms: u64,
}

/// Metadata handed to the [`RunRecorder`](crate::recorder::RunRecorder)
/// seam after a successful run. The pipeline only ever appends; it never
/// reads history back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Content hash of the analyzed document.
    pub content_hash: String,
    pub document_type: DocumentType,
    /// Number of sections in the produced result.
    pub section_count: usize,
    pub cache_hit: bool,
    pub stats: RunStats,
}

/// Everything a successful run returns.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutput {
    pub result: AnalysisResult,
    pub stats: RunStats,
}
