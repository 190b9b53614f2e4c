//! Web search provider trait.

use crate::error::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How hard the provider should look.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchDepth {
    Basic,
    #[default]
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        }
    }
}

/// Search flavour; providers map it to topic and domain filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    #[default]
    General,
    Technical,
    Industry,
    News,
    Documentation,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::General => "general",
            SearchType::Technical => "technical",
            SearchType::Industry => "industry",
            SearchType::News => "news",
            SearchType::Documentation => "documentation",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(SearchType::General),
            "technical" => Ok(SearchType::Technical),
            "industry" => Ok(SearchType::Industry),
            "news" => Ok(SearchType::News),
            "documentation" => Ok(SearchType::Documentation),
            other => Err(SearchError::RequestFailed(format!(
                "unknown search type '{other}'"
            ))),
        }
    }
}

/// A web search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchQuery {
    pub query: String,
    #[serde(default)]
    pub depth: SearchDepth,
    pub max_results: usize,
    #[serde(default)]
    pub search_type: SearchType,
}

/// One web search result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebSearchHit {
    pub content: String,
    pub url: String,
    pub score: f64,
}

/// An external web search backend.
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: WebSearchQuery) -> Result<Vec<WebSearchHit>, SearchError>;
}
