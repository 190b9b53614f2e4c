//! Knowledge search tool: vector retrieval over the brand's own documents.
//!
//! Embeds the query through the gateway, so the embedding is priced and
//! logged like any other call, then ranks chunks in the knowledge store.

use crate::formatters::{knowledge_context, rank_documents};
use crate::gateway_failure;
use async_trait::async_trait;
use brandforge_core::completion::StageUsage;
use brandforge_core::error::ToolError;
use brandforge_core::knowledge::{KnowledgeQuery, KnowledgeStore};
use brandforge_core::tool::{Capability, Tool, ToolOutput};
use brandforge_providers::ModelGateway;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct KnowledgeSearchArgs {
    query: String,
    /// Restricts hits to chunks tagged with this brand
    #[serde(default)]
    brand: Option<String>,
    #[serde(default = "default_collection")]
    collection: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
    #[serde(default)]
    max_distance: Option<f32>,
    #[serde(default = "default_embedding_model")]
    embedding_model: String,
}

fn default_collection() -> String {
    "brand_content".into()
}

fn default_max_results() -> usize {
    3
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

pub struct KnowledgeSearchTool {
    gateway: ModelGateway,
    store: Arc<dyn KnowledgeStore>,
}

impl KnowledgeSearchTool {
    pub fn new(gateway: ModelGateway, store: Arc<dyn KnowledgeStore>) -> Self {
        Self { gateway, store }
    }
}

#[async_trait]
impl Tool for KnowledgeSearchTool {
    fn capability(&self) -> Capability {
        Capability::KnowledgeSearch
    }

    fn description(&self) -> &str {
        "Search the brand's past content for posts, positioning and facts related to the topic."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "What to look for" },
                "brand": { "type": "string", "description": "Brand whose documents are searched" },
                "collection": { "type": "string", "default": "brand_content" },
                "max_results": { "type": "integer", "default": 3 },
                "max_distance": { "type": "number", "description": "Drop hits farther than this" },
                "embedding_model": { "type": "string", "default": "text-embedding-3-small" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: KnowledgeSearchArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if args.query.trim().is_empty() {
            return Err(ToolError::InvalidArguments("Missing 'query' argument".into()));
        }

        let embedded = self
            .gateway
            .embed(&args.embedding_model, &args.query)
            .await
            .map_err(|e| gateway_failure(Capability::KnowledgeSearch, e))?;
        let mut usage = StageUsage::default();
        usage.record_embedding(&embedded);

        let metadata_filter = args
            .brand
            .iter()
            .map(|brand| ("brand".to_string(), brand.to_lowercase()))
            .collect::<BTreeMap<_, _>>();

        debug!(
            store = self.store.name(),
            collection = %args.collection,
            k = args.max_results,
            "Querying knowledge store"
        );
        let hits = self
            .store
            .query(KnowledgeQuery {
                collection: args.collection,
                embedding: embedded.embedding,
                k: args.max_results,
                metadata_filter,
                max_distance: args.max_distance,
            })
            .await?;

        let documents = rank_documents(&hits);
        info!(documents = documents.len(), "Knowledge search complete");

        Ok(ToolOutput {
            summary: format!("Found {} relevant brand documents", documents.len()),
            context: knowledge_context(&documents),
            data: Some(serde_json::json!({ "documents": documents })),
            usage,
        })
    }
}
