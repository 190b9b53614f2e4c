//! Tavily web search client.
//!
//! Maps [`SearchType`] onto Tavily's domain allowlists and always excludes
//! social and forum domains, which make poor factual sources.

use async_trait::async_trait;
use brandforge_config::SearchConfig;
use brandforge_core::error::SearchError;
use brandforge_core::search::{SearchType, WebSearchHit, WebSearchProvider, WebSearchQuery};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const EXCLUDED_DOMAINS: [&str; 9] = [
    "linkedin.com/posts",
    "linkedin.com/pulse",
    "medium.com",
    "facebook.com",
    "twitter.com",
    "x.com",
    "reddit.com/r/",
    "quora.com",
    "pinterest.com",
];

/// Domains searched for each search type. `General` searches everywhere.
pub fn include_domains(search_type: SearchType) -> &'static [&'static str] {
    match search_type {
        SearchType::General => &[],
        SearchType::Technical => &[
            "github.com",
            "arxiv.org",
            "openai.com",
            "anthropic.com",
            "microsoft.com/research",
            "google.com/research",
            "huggingface.co",
            "deepmind.google",
            "ai.meta.com",
        ],
        SearchType::Industry => &[
            "gartner.com",
            "forrester.com",
            "mckinsey.com",
            "idc.com",
            "statista.com",
            "deloitte.com",
            "pwc.com",
            "accenture.com",
            "bcg.com",
        ],
        SearchType::News => &[
            "techcrunch.com",
            "theverge.com",
            "wired.com",
            "reuters.com",
            "bloomberg.com",
            "ft.com",
            "wsj.com",
            "arstechnica.com",
            "venturebeat.com",
        ],
        SearchType::Documentation => &[
            "azure.microsoft.com",
            "docs.python.org",
            "docs.aws.amazon.com",
            "langchain.com",
            "crewai.com",
            "cloud.google.com",
            "kubernetes.io",
            "docker.com",
        ],
    }
}

pub struct TavilyClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl TavilyClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::NotConfigured(format!("HTTP client: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build the client from the `[search]` config section.
    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            SearchError::NotConfigured("no search API key: set TAVILY_API_KEY".into())
        })?;
        Self::new(api_key, config.base_url.clone(), Duration::from_secs(30))
    }

    fn request_body<'a>(&'a self, query: &'a WebSearchQuery) -> TavilyRequest<'a> {
        TavilyRequest {
            api_key: &self.api_key,
            query: &query.query,
            max_results: query.max_results,
            search_depth: query.depth.as_str(),
            include_raw_content: false,
            include_domains: include_domains(query.search_type),
            exclude_domains: &EXCLUDED_DOMAINS,
        }
    }
}

// --- Tavily wire types ---

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
    include_raw_content: bool,
    #[serde(skip_serializing_if = "no_domains")]
    include_domains: &'static [&'static str],
    exclude_domains: &'static [&'static str],
}

fn no_domains(domains: &&[&str]) -> bool {
    domains.is_empty()
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
}

#[async_trait]
impl WebSearchProvider for TavilyClient {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: WebSearchQuery) -> Result<Vec<WebSearchHit>, SearchError> {
        let url = format!("{}/search", self.base_url);
        debug!(
            query = %query.query,
            depth = query.depth.as_str(),
            search_type = %query.search_type,
            "Sending web search"
        );

        let response = self
            .client
            .post(&url)
            .json(&self.request_body(&query))
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchError::RequestFailed(format!("invalid response body: {e}")))?;

        let hits: Vec<WebSearchHit> = parsed
            .results
            .into_iter()
            .filter(|r| !r.content.trim().is_empty())
            .map(|r| WebSearchHit {
                content: r.content,
                url: r.url,
                score: r.score,
            })
            .collect();

        info!(results = hits.len(), "Web search complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brandforge_core::search::SearchDepth;

    fn client() -> TavilyClient {
        TavilyClient::new("tvly-test", "https://api.tavily.com/", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn request_body_carries_filters() {
        let client = client();
        let query = WebSearchQuery {
            query: "zero trust adoption 2025".into(),
            depth: SearchDepth::Basic,
            max_results: 4,
            search_type: SearchType::News,
        };
        let body = serde_json::to_value(client.request_body(&query)).unwrap();
        assert_eq!(body["search_depth"], "basic");
        assert_eq!(body["max_results"], 4);
        assert_eq!(body["include_domains"][0], "techcrunch.com");
        assert_eq!(body["exclude_domains"].as_array().unwrap().len(), 9);
        assert_eq!(client.base_url, "https://api.tavily.com");
    }

    #[test]
    fn general_search_has_no_allowlist() {
        let query = WebSearchQuery {
            query: "q".into(),
            depth: SearchDepth::Advanced,
            max_results: 3,
            search_type: SearchType::General,
        };
        let client = client();
        let body = serde_json::to_value(client.request_body(&query)).unwrap();
        assert!(body.get("include_domains").is_none());
        assert!(include_domains(SearchType::Technical).contains(&"github.com"));
    }

    #[test]
    fn from_config_requires_key() {
        let config = SearchConfig {
            api_key: None,
            base_url: "https://api.tavily.com".into(),
        };
        assert!(matches!(
            TavilyClient::from_config(&config),
            Err(SearchError::NotConfigured(_))
        ));
    }

    #[test]
    fn response_parsing_tolerates_missing_fields() {
        let parsed: TavilyResponse = serde_json::from_str(
            r#"{"results": [{"url": "https://nist.gov", "content": "SP 800-207", "score": 0.9, "title": "NIST"}, {"url": "https://x"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert!(parsed.results[1].content.is_empty());
    }
}
