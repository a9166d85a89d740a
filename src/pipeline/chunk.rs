//! Chunking: split extracted text into bounded, overlap-linked windows.
//!
//! Greedy fixed-window split over the concatenated document text. Each
//! window prefers to end on a paragraph break, then a sentence end, then
//! any whitespace, and only hard-cuts mid-word when the window contains no
//! boundary at all. Every chunk after the first starts with exactly the
//! trailing `overlap_chars` characters of its predecessor, so a fact
//! severed by a window edge still appears intact in one of the two chunks.
//!
//! All lengths are measured in characters, not bytes — a hard cut through a
//! multi-byte code point must be impossible.

use crate::document::PageText;
use crate::error::AnalysisError;

/// Chunker configuration.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum chunk length in characters.
    pub max_chars: usize,
    /// Characters of predecessor suffix repeated at the start of each
    /// following chunk. Must be smaller than `max_chars`.
    pub overlap_chars: usize,
}

impl ChunkConfig {
    /// Validate before any processing. An overlap as large as the window
    /// would stall the split (the next start would not advance).
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.max_chars == 0 {
            return Err(AnalysisError::InvalidConfiguration(
                "max_chars must be ≥ 1".into(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "overlap_chars ({}) must be smaller than max_chars ({})",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

/// One retrievable text segment.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Dense 0-based position in the chunk sequence.
    pub seq: usize,
    /// 1-indexed (first, last) page the chunk's span touches.
    pub pages: (usize, usize),
    pub text: String,
    /// Filled by the retrieval stage, once per document.
    pub embedding: Option<Vec<f32>>,
}

/// Split extracted pages into chunks.
///
/// Pages are joined with blank lines (preserving paragraph boundaries at
/// page edges) and each chunk records the page range its span covers.
/// Returns an empty vector for whitespace-only input.
///
/// # Errors
///
/// `InvalidConfiguration` if `config` fails validation.
pub fn split_pages(pages: &[PageText], config: &ChunkConfig) -> Result<Vec<Chunk>, AnalysisError> {
    config.validate()?;

    // Concatenate pages, tracking each page's starting char offset.
    let mut text = String::new();
    let mut page_starts: Vec<(usize, usize)> = Vec::with_capacity(pages.len());
    let mut offset = 0usize;
    for page in pages {
        if !text.is_empty() {
            text.push_str("\n\n");
            offset += 2;
        }
        page_starts.push((offset, page.number));
        text.push_str(&page.text);
        offset += page.text.chars().count();
    }

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let raw_end = (start + config.max_chars).min(n);
        let end = if raw_end == n {
            n
        } else {
            // The cut must land strictly past the overlap span, or the next
            // chunk's start would not advance.
            let lo = start + config.overlap_chars + 1;
            find_cut(&chars, lo, raw_end).unwrap_or(raw_end)
        };

        chunks.push(Chunk {
            seq: chunks.len(),
            pages: (
                page_at(&page_starts, start),
                page_at(&page_starts, end.saturating_sub(1)),
            ),
            text: chars[start..end].iter().collect(),
            embedding: None,
        });

        if end == n {
            break;
        }
        start = end - config.overlap_chars;
    }

    Ok(chunks)
}

/// Find the best cut position in `[lo, hi]` (chunk becomes `[start, cut)`).
///
/// Preference order: paragraph break, sentence end, any whitespace. Each
/// pass scans backwards so the window stays as full as possible.
fn find_cut(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    if lo > hi {
        return None;
    }

    // Paragraph: cut right after "\n\n".
    for i in (lo..=hi).rev() {
        if i >= 2 && chars[i - 1] == '\n' && chars[i - 2] == '\n' {
            return Some(i);
        }
    }
    // Sentence: '.', '!' or '?' followed by whitespace.
    for i in (lo..=hi).rev() {
        if matches!(chars[i - 1], '.' | '!' | '?') && i < chars.len() && chars[i].is_whitespace() {
            return Some(i);
        }
    }
    // Any whitespace.
    for i in (lo..=hi).rev() {
        if chars[i - 1].is_whitespace() {
            return Some(i);
        }
    }
    None
}

/// 1-indexed page number owning the character at `idx`.
fn page_at(page_starts: &[(usize, usize)], idx: usize) -> usize {
    let k = page_starts.partition_point(|&(s, _)| s <= idx);
    if k == 0 {
        page_starts.first().map(|&(_, p)| p).unwrap_or(1)
    } else {
        page_starts[k - 1].1
    }
}
