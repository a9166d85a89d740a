//! Prompt composition: assemble persona, retrieved context, and the task
//! template into one bounded prompt.
//!
//! The budget is enforced in characters (`max_prompt_tokens * 4`, the same
//! chars/4 heuristic used for the token estimate) so the estimate of the
//! final prompt can never exceed the configured token budget. Chunks are
//! appended whole, in (section, rank) order; the first chunk that would
//! cross the line stops packing entirely — a truncated excerpt that stops
//! mid-sentence is worse in the prompt than no excerpt at all.

use tracing::debug;

use crate::config::{AnalysisConfig, DocumentType};
use crate::pipeline::retrieve::RankedChunk;
use crate::prompts;

/// Assumed characters per token for budget arithmetic.
const TOKEN_CHARS: usize = 4;

/// Estimate token count using the chars/4 heuristic.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / TOKEN_CHARS
}

/// Retrieved context for one analysis section.
#[derive(Debug, Clone)]
pub struct SectionContext {
    /// The section's retrieval query, also used as its context header.
    pub query: String,
    /// Top-K chunks for this section, in rank order.
    pub chunks: Vec<RankedChunk>,
}

/// The composed prompt plus what went into it.
#[derive(Debug, Clone)]
pub struct ComposedPrompt {
    pub text: String,
    /// Chunks that made it in before the budget line.
    pub included_chunks: usize,
    /// `estimate_tokens` of `text`.
    pub estimated_tokens: usize,
}

/// Build the analysis prompt for a document type from per-section context.
///
/// The fixed skeleton (persona, section headers with placeholders, task
/// template) is costed first; whatever budget remains is filled with chunks.
/// The skeleton itself is assumed to fit — config validation keeps the
/// budget above zero and templates are small.
pub fn build_prompt(
    doc_type: DocumentType,
    sections: &[SectionContext],
    config: &AnalysisConfig,
) -> ComposedPrompt {
    let template = prompts::template(doc_type);
    let char_budget = config.max_prompt_tokens.saturating_mul(TOKEN_CHARS);

    const EMPTY_SECTION: &str = "No relevant content found.\n";

    // Fixed cost: persona + headers + placeholders + template + connectives.
    // Placeholders are counted even for sections that end up with content,
    // which errs on the short side — the safe direction for a hard budget.
    let mut fixed = prompts::ANALYST_PREAMBLE.chars().count();
    fixed += "\n\nContext (retrieved excerpts per section):\n\n".chars().count();
    for section in sections {
        fixed += format!("### {}\n", section.query).chars().count();
        fixed += EMPTY_SECTION.chars().count() + 1;
    }
    fixed += "\nTask:\n".chars().count();
    fixed += template.chars().count();

    let mut remaining = char_budget.saturating_sub(fixed);
    let mut included = 0usize;
    let mut bodies: Vec<String> = vec![String::new(); sections.len()];

    'pack: for (i, section) in sections.iter().enumerate() {
        for ranked in &section.chunks {
            let block = format!(
                "[Chunk {}, pages {}-{}]\n{}\n\n",
                ranked.chunk.seq + 1,
                ranked.chunk.pages.0,
                ranked.chunk.pages.1,
                ranked.chunk.text
            );
            let cost = block.chars().count();
            if cost > remaining {
                break 'pack;
            }
            bodies[i].push_str(&block);
            remaining -= cost;
            included += 1;
        }
    }

    let mut text = String::with_capacity(char_budget.min(1 << 20));
    text.push_str(prompts::ANALYST_PREAMBLE);
    text.push_str("\n\nContext (retrieved excerpts per section):\n\n");
    for (section, body) in sections.iter().zip(&bodies) {
        text.push_str(&format!("### {}\n", section.query));
        if body.is_empty() {
            text.push_str(EMPTY_SECTION);
            text.push('\n');
        } else {
            text.push_str(body);
        }
    }
    text.push_str("\nTask:\n");
    text.push_str(template);

    let estimated_tokens = estimate_tokens(&text);
    debug!(
        included,
        estimated_tokens,
        budget = config.max_prompt_tokens,
        "prompt composed"
    );

    ComposedPrompt {
        text,
        included_chunks: included,
        estimated_tokens,
    }
}
