//! Turn raw retrieval hits into prompt-ready context blocks.
//!
//! Each formatter returns the text injected verbatim into the generation
//! prompt plus a compact serializable record kept as the tool's data.

use brandforge_core::knowledge::KnowledgeHit;
use brandforge_core::search::WebSearchHit;
use serde::Serialize;
use std::collections::BTreeMap;

/// Characters kept per retrieved document before truncation.
pub const MAX_CONTENT_CHARS: usize = 2000;

const TRUNCATION_MARKER: &str = "... [truncated]";

fn rule() -> String {
    format!("|{}", "-".repeat(70))
}

/// Cut `text` to `max_chars`, marking the cut.
pub fn truncate_content(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_string(),
    }
}

/// Cut `text` to at most `max_chars`, backing off to the last word boundary
/// when the cut lands mid-text.
pub fn truncate_at_word(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let head = &text[..cut];
    match head.rsplit_once(' ') {
        Some((words, _)) if !words.is_empty() => words.trim_end().to_string(),
        _ => head.to_string(),
    }
}

/// One ranked brand document.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedDocument {
    pub rank: usize,
    pub content: String,
    /// `1 - distance`, rounded to three decimals.
    pub relevance_score: f64,
    pub metadata: BTreeMap<String, String>,
}

/// One ranked web source.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedSource {
    pub rank: usize,
    pub content: String,
    pub url: String,
    pub score: f64,
}

pub fn rank_documents(hits: &[KnowledgeHit]) -> Vec<RankedDocument> {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| RankedDocument {
            rank: i + 1,
            content: truncate_content(&hit.text, MAX_CONTENT_CHARS),
            relevance_score: ((1.0 - f64::from(hit.distance)) * 1000.0).round() / 1000.0,
            metadata: hit.metadata.clone(),
        })
        .collect()
}

pub fn rank_sources(hits: &[WebSearchHit]) -> Vec<RankedSource> {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| RankedSource {
            rank: i + 1,
            content: truncate_content(&hit.content, MAX_CONTENT_CHARS),
            url: hit.url.clone(),
            score: hit.score,
        })
        .collect()
}

/// "RELEVANT PAST CONTENT" block for brand documents. Empty when there are none.
pub fn knowledge_context(documents: &[RankedDocument]) -> String {
    if documents.is_empty() {
        return String::new();
    }
    let mut lines = vec![
        format!("\n{}", rule()),
        "  RELEVANT PAST CONTENT:".to_string(),
        rule(),
    ];
    for doc in documents {
        let source = doc
            .metadata
            .get("source")
            .map(String::as_str)
            .unwrap_or("unknown");
        lines.push(format!(
            "{}. {} (Source: {source}, relevance: {:.3})",
            doc.rank, doc.content, doc.relevance_score
        ));
    }
    lines.join("\n")
}

/// "RELEVANT SEARCH CONTENT" block for web sources. Empty when there are none.
pub fn search_context(sources: &[RankedSource]) -> String {
    if sources.is_empty() {
        return String::new();
    }
    let mut lines = vec![
        format!("\n{}", rule()),
        "  RELEVANT SEARCH CONTENT:".to_string(),
        rule(),
    ];
    for source in sources {
        lines.push(format!("{}. {}", source.rank, source.content));
        lines.push(format!("   Source: {}\n", source.url));
    }
    lines.join("\n")
}
