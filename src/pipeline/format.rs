//! Result formatting: split raw model output into named, ordered sections.
//!
//! The parse is line-oriented. Three heading shapes open a new section:
//!
//! - ATX headings: `## Market Opportunity`
//! - whole-line bold numbered headings: `**3. Market Opportunity**`
//! - plain numbered headings: `3. Market Opportunity`
//!
//! Numbered lines are the ambiguous case — ordered lists inside a section
//! body look just like headings. A numbered line only counts as a heading
//! when it is short and does not end like a sentence, so list items such as
//! `1. Revenue grew 40% year over year.` stay in the body where they belong.
//!
//! Anything before the first heading becomes an implicit "Summary" section,
//! so a model that leads with a paragraph of prose still produces a
//! well-formed result.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::AnalysisError;
use crate::output::{AnalysisResult, AnalysisSection};

/// `# Heading` through `###### Heading`, tolerating trailing hashes.
static RE_ATX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#{1,6}\s+(.+?)\s*#*\s*$").unwrap());

/// `**3. Heading**` / `**Heading**` as the entire line.
static RE_BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\*\*\s*([^*]+?)\s*\*\*\s*:?\s*$").unwrap());

/// `3. Heading` / `4.1 Heading` / `5) Heading`.
static RE_NUMBERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)*[.)]?\s+(\S.*?)\s*$").unwrap());

/// Leading list/heading numbering inside a captured title.
static RE_LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)*[.)]?\s+").unwrap());

const IMPLICIT_SECTION: &str = "Summary";

/// Parse raw response text into an [`AnalysisResult`].
///
/// # Errors
///
/// `UnparseableResponse` when the input is empty or whitespace-only.
pub fn parse_sections(raw: &str) -> Result<AnalysisResult, AnalysisError> {
    if raw.trim().is_empty() {
        return Err(AnalysisError::UnparseableResponse);
    }

    let mut sections: Vec<AnalysisSection> = Vec::new();
    let mut current_name: Option<String> = None;
    let mut current_body = String::new();

    let mut flush = |name: Option<String>, body: &mut String| {
        let content = body.trim().to_string();
        body.clear();
        match name {
            Some(name) => sections.push(AnalysisSection { name, content }),
            // Leading text before any heading: keep only if non-empty.
            None if !content.is_empty() => sections.push(AnalysisSection {
                name: IMPLICIT_SECTION.to_string(),
                content,
            }),
            None => {}
        }
    };

    for line in raw.lines() {
        match heading_of(line) {
            Some(name) => {
                flush(current_name.take(), &mut current_body);
                current_name = Some(name);
            }
            None => {
                current_body.push_str(line);
                current_body.push('\n');
            }
        }
    }
    flush(current_name.take(), &mut current_body);

    if sections.is_empty() {
        // Headings only appeared with empty bodies, or nothing at all —
        // the trim check above guarantees there was *some* text.
        sections.push(AnalysisSection {
            name: IMPLICIT_SECTION.to_string(),
            content: raw.trim().to_string(),
        });
    }

    Ok(AnalysisResult::new(sections))
}

/// If this line is a heading, return the section name it opens.
fn heading_of(line: &str) -> Option<String> {
    let trimmed = line.trim();

    if let Some(caps) = RE_ATX.captures(trimmed) {
        return Some(strip_numbering(&caps[1]));
    }
    if let Some(caps) = RE_BOLD.captures(trimmed) {
        return Some(strip_numbering(&caps[1]));
    }
    if let Some(caps) = RE_NUMBERED.captures(trimmed) {
        let title = &caps[1];
        if looks_like_title(title) {
            return Some(title.to_string());
        }
    }
    None
}

/// Remove leading `3.` / `4.1` numbering from a heading name.
fn strip_numbering(title: &str) -> String {
    RE_LEADING_NUMBER.replace(title.trim(), "").trim().to_string()
}

/// Titles are short and do not end like sentences.
fn looks_like_title(text: &str) -> bool {
    text.chars().count() <= 80
        && !text.ends_with(['.', ',', ';', '!', '?'])
        && text.chars().next().is_some_and(|c| c.is_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_unparseable() {
        assert!(matches!(
            parse_sections(""),
            Err(AnalysisError::UnparseableResponse)
        ));
        assert!(matches!(
            parse_sections("   \n\t  "),
            Err(AnalysisError::UnparseableResponse)
        ));
    }

    #[test]
    fn atx_headings_split_sections() {
        let raw = "## Executive Summary\nStrong team.\n\n## Market Opportunity\nTAM $4B.\n";
        let result = parse_sections(raw).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.get("Executive Summary"), Some("Strong team."));
        assert_eq!(result.get("Market Opportunity"), Some("TAM $4B."));
    }

    #[test]
    fn leading_text_becomes_summary() {
        let raw = "Overall a credible plan.\n\n## Risks\nKey-person risk.\n";
        let result = parse_sections(raw).unwrap();
        assert_eq!(result.sections()[0].name, "Summary");
        assert_eq!(result.get("Summary"), Some("Overall a credible plan."));
        assert_eq!(result.get("Risks"), Some("Key-person risk."));
    }

    #[test]
    fn no_headings_at_all_is_one_summary() {
        let raw = "Just two paragraphs of prose.\n\nWith no headings anywhere.";
        let result = parse_sections(raw).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.sections()[0].name, "Summary");
        assert!(result.get("Summary").unwrap().contains("no headings"));
    }

    #[test]
    fn bold_numbered_headings_are_recognised() {
        let raw = "**1. Executive Summary**\nGood.\n**2. Team**\nExperienced.\n";
        let result = parse_sections(raw).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.get("Executive Summary"), Some("Good."));
        assert_eq!(result.get("Team"), Some("Experienced."));
    }

    #[test]
    fn plain_numbered_headings_are_recognised() {
        let raw = "1. Executive Summary\nGood numbers.\n2. Financial Highlights\nRevenue up.\n";
        let result = parse_sections(raw).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.get("Financial Highlights"), Some("Revenue up."));
    }

    #[test]
    fn numbered_list_items_stay_in_the_body() {
        let raw = "## Financial Highlights\n1. Revenue grew 40% year over year.\n2. Burn rate fell by half.\n";
        let result = parse_sections(raw).unwrap();
        assert_eq!(result.len(), 1);
        let body = result.get("Financial Highlights").unwrap();
        assert!(body.contains("Revenue grew"));
        assert!(body.contains("Burn rate"));
    }

    #[test]
    fn atx_numbering_is_stripped() {
        let raw = "## 3. Market Opportunity\nLarge.\n";
        let result = parse_sections(raw).unwrap();
        assert_eq!(result.sections()[0].name, "Market Opportunity");
    }

    #[test]
    fn section_order_is_display_order() {
        let raw = "## Zebra\nz\n## Alpha\na\n## Mango\nm\n";
        let result = parse_sections(raw).unwrap();
        let names: Vec<&str> = result.sections().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Zebra", "Alpha", "Mango"]);
    }

    #[test]
    fn heading_with_empty_body_is_kept() {
        let raw = "## Summary\nFine.\n## Risks\n";
        let result = parse_sections(raw).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.get("Risks"), Some(""));
    }
}
