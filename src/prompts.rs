//! Instruction templates for each document type.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the analysis sections a document type
//!    produces are exactly the numbered headings of its template; changing
//!    a template automatically changes both the retrieval queries and the
//!    task instructions.
//!
//! 2. **Testability** — unit tests inspect templates and parsed section
//!    queries directly without calling a model.

use crate::config::DocumentType;
use once_cell::sync::Lazy;
use regex::Regex;

/// Analyst persona and grounding rules prepended to every composed prompt.
///
/// The "Not found" rule is what keeps a high-temperature model honest: a
/// section without supporting context must say so instead of inventing
/// plausible numbers.
pub const ANALYST_PREAMBLE: &str = "\
You are a seasoned business analyst. Using ONLY the provided context excerpts, \
produce a structured analysis with clear numbered section headers matching the \
task outline, and bullet points where helpful. Aim for 200-400 words per \
section. Cite specific evidence (numbers, percentages, timelines) from the \
excerpts wherever possible. If a section lacks evidence in the context, write \
\"Not found\" for that section. Do not invent facts.";

const BUSINESS_ANALYSIS_TEMPLATE: &str = "\
Analyze this document and provide:
1. Overall Summary (2-3 sentences)
2. Company Vision and Overview (type of business, a clear vision statement, short overview)
3. Industry and Market Analysis (competitive positioning, opportunities, risks)
4. Feedback Analysis
   4.1 Positive Points (3-4 most common)
   4.2 Negative Points (3-4 most common)
   4.3 Non-business Related (staff, cleanliness, behaviour)
5. Final Verdict (conclusion combining the insights above with a recommendation)

Format in clear sections with bullet points where relevant.";

const PITCH_DECK_TEMPLATE: &str = "\
Analyze this pitch deck and provide QUANTIFIED insights:
1. Executive Summary (2-3 sentences with key metrics)
2. Value Proposition and Competitive Advantage (what makes it unique, quantified benefits)
3. Market Opportunity (TAM, SAM, SOM, growth rate, target segments)
4. Business Model and Revenue Projections (revenue streams, unit economics, break-even timeline)
5. Competitive Landscape (top competitors, differentiation, positioning)
6. Financial Highlights (projections, growth rates, key metrics)
7. Team Strengths and Execution Capability
8. Investment Ask and Use of Funds
9. Risk Assessment and Mitigation
10. Growth Strategy and Scalability (expansion plans, scaling milestones)

Provide SPECIFIC NUMBERS, PERCENTAGES, and TIMELINES wherever possible.";

const BUSINESS_PLAN_TEMPLATE: &str = "\
Analyze this business plan and provide QUANTIFIED insights:
1. Business Overview and Value Proposition (unique selling points with metrics)
2. Market Analysis and Opportunity (market size, growth rates, target segments)
3. Product and Service Details (key features, differentiation from alternatives)
4. Revenue Model and Projections (streams, pricing, margins, 3-5 year outlook)
5. Marketing Strategy and Acquisition (channels, CAC, conversion rates)
6. Operations Plan and Scalability (efficiency metrics, bottlenecks, solutions)
7. Financial Projections (revenue, costs, profitability, cash flow)
8. Risk Analysis and Mitigation (top risks with probability, strategies)
9. Implementation Timeline and Milestones (key dates, success metrics per phase)

Provide SPECIFIC NUMBERS, PERCENTAGES, and TIMELINES. Focus on EXECUTION.";

const MARKET_RESEARCH_TEMPLATE: &str = "\
Analyze this market research and provide QUANTIFIED insights:
1. Market Size and Growth Metrics (TAM, SAM, SOM, CAGR, regional breakdown)
2. Key Trends and Opportunities (adoption rates, market gaps, entry timing)
3. Customer Segments and Behavior (segment sizes, acquisition costs, lifetime value)
4. Competitor Landscape and Positioning (market share, strengths, weaknesses)
5. Market Drivers and Barriers (growth drivers, entry barriers, regulation)
6. Future Predictions and Forecasts (market evolution, adoption curves)
7. Entry Strategy and Timing (costs, timeline, success probability)
8. Investment Opportunity Assessment (attractiveness, requirements, returns)

Provide SPECIFIC NUMBERS, PERCENTAGES, and TIMELINES. Focus on ACTIONABLE INSIGHTS.";

const FINANCIAL_MODEL_TEMPLATE: &str = "\
Analyze this financial document and provide QUANTIFIED insights:
1. Revenue Streams and Projections (breakdown, growth rates, seasonality)
2. Cost Structure and Efficiency (fixed vs variable, optimisation, scaling costs)
3. Unit Economics and Profitability (LTV, CAC, payback period, margins)
4. Key Financial Metrics (burn rate, runway, revenue per customer)
5. Cash Flow Analysis (projections, working capital, management)
6. Funding Requirements and Strategy (needs, timeline, use of funds)
7. Break-even Analysis (timeline, profitability drivers)
8. Financial Risks and Mitigation (stress factors, strategies)
9. Investment Highlights and Returns (attractiveness, expected returns, exit)

Provide SPECIFIC NUMBERS, PERCENTAGES, and TIMELINES. Focus on FINANCIAL VIABILITY.";

/// The task template for a document type.
pub fn template(doc_type: DocumentType) -> &'static str {
    match doc_type {
        DocumentType::BusinessAnalysis => BUSINESS_ANALYSIS_TEMPLATE,
        DocumentType::PitchDeck => PITCH_DECK_TEMPLATE,
        DocumentType::BusinessPlan => BUSINESS_PLAN_TEMPLATE,
        DocumentType::MarketResearch => MARKET_RESEARCH_TEMPLATE,
        DocumentType::FinancialModel => FINANCIAL_MODEL_TEMPLATE,
    }
}

/// Numbered heading lines like `1.`, `4.1`, `10.` at the start of a line.
static RE_NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)*\.?\s+(.+)$").unwrap());

/// Parenthetical elaborations like "(2-3 sentences with key metrics)".
static RE_PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]*\)\s*$").unwrap());

/// Extract the retrieval queries for a document type: one per numbered
/// heading in its template, with trailing parentheticals stripped so the
/// query embeds the section topic rather than formatting instructions.
///
/// Falls back to a generic section list if a template somehow yields no
/// numbered headings.
pub fn section_queries(doc_type: DocumentType) -> Vec<String> {
    let mut queries: Vec<String> = template(doc_type)
        .lines()
        .filter_map(|line| {
            RE_NUMBERED_HEADING
                .captures(line.trim())
                .map(|caps| RE_PARENTHETICAL.replace(&caps[1], "").trim().to_string())
        })
        .filter(|q| !q.is_empty())
        .collect();

    if queries.is_empty() {
        queries = vec![
            "Overall Summary".to_string(),
            "Market Opportunity".to_string(),
            "Business Model".to_string(),
            "Risks".to_string(),
            "Final Verdict".to_string(),
        ];
    }
    queries
}
