//! Web search tool, backed by a [`WebSearchProvider`].
//!
//! Topics longer than [`MAX_QUERY_CHARS`] are first rewritten into a focused
//! query by the brand's search optimization model.

use crate::formatters::{rank_sources, search_context, truncate_at_word};
use crate::gateway_failure;
use async_trait::async_trait;
use brandforge_config::ModelSettings;
use brandforge_core::completion::StageUsage;
use brandforge_core::error::ToolError;
use brandforge_core::message::Message;
use brandforge_core::provider::ProviderRequest;
use brandforge_core::search::{SearchDepth, SearchType, WebSearchProvider, WebSearchQuery};
use brandforge_core::tool::{Capability, Tool, ToolOutput};
use brandforge_providers::ModelGateway;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Queries longer than this are rewritten before searching.
pub const MAX_QUERY_CHARS: usize = 400;

#[derive(Debug, Deserialize)]
struct WebSearchArgs {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
    #[serde(default)]
    search_depth: SearchDepth,
    #[serde(default)]
    search_type: SearchType,
    /// Model used to shorten long queries; without one they are cut at a word.
    #[serde(default)]
    optimizer: Option<ModelSettings>,
}

fn default_max_results() -> usize {
    5
}

fn optimization_prompt(topic: &str) -> String {
    format!(
        "Convert this detailed topic into a focused web search query (<= {MAX_QUERY_CHARS} chars). \
         Remove personal narrative, keep key facts/claims to verify.\n\nTopic: {topic}\n\nSearch query:"
    )
}

pub struct WebSearchTool {
    gateway: ModelGateway,
    provider: Arc<dyn WebSearchProvider>,
}

impl WebSearchTool {
    pub fn new(gateway: ModelGateway, provider: Arc<dyn WebSearchProvider>) -> Self {
        Self { gateway, provider }
    }

    /// The query actually sent to the search backend.
    async fn optimize_query(
        &self,
        query: &str,
        optimizer: Option<&ModelSettings>,
        usage: &mut StageUsage,
    ) -> Result<String, ToolError> {
        if query.chars().count() <= MAX_QUERY_CHARS {
            return Ok(query.to_string());
        }
        let Some(settings) = optimizer else {
            return Ok(truncate_at_word(query, MAX_QUERY_CHARS));
        };

        info!(chars = query.chars().count(), model = %settings.model, "Query too long, optimizing");
        let request = ProviderRequest::new(
            settings.model.clone(),
            vec![Message::user(optimization_prompt(query))],
        )
        .with_temperature(settings.temperature)
        .with_max_tokens(settings.max_tokens);

        let result = self
            .gateway
            .complete(request)
            .await
            .map_err(|e| gateway_failure(Capability::WebSearch, e))?;
        usage.record(&result);

        let optimized = truncate_at_word(&result.content, MAX_QUERY_CHARS);
        debug!(chars = optimized.chars().count(), query = %optimized, "Optimized query");
        Ok(optimized)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn capability(&self) -> Capability {
        Capability::WebSearch
    }

    fn description(&self) -> &str {
        "Search the web for current facts, statistics and sources that support the topic."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query" },
                "max_results": { "type": "integer", "default": 5 },
                "search_depth": { "type": "string", "enum": ["basic", "advanced"] },
                "search_type": {
                    "type": "string",
                    "enum": ["general", "technical", "industry", "news", "documentation"]
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: WebSearchArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if args.query.trim().is_empty() {
            return Err(ToolError::InvalidArguments("Missing 'query' argument".into()));
        }

        let mut usage = StageUsage::default();
        let query = self
            .optimize_query(&args.query, args.optimizer.as_ref(), &mut usage)
            .await?;

        let hits = self
            .provider
            .search(WebSearchQuery {
                query: query.clone(),
                depth: args.search_depth,
                max_results: args.max_results,
                search_type: args.search_type,
            })
            .await?;

        let sources = rank_sources(&hits);
        info!(
            provider = self.provider.name(),
            sources = sources.len(),
            "Web search tool complete"
        );

        Ok(ToolOutput {
            summary: format!("Found {} web sources", sources.len()),
            context: search_context(&sources),
            data: Some(serde_json::json!({
                "query": args.query,
                "optimized_query": query,
                "sources": sources,
            })),
            usage,
        })
    }
}
