//! Research tools for brandforge.
//!
//! Two capabilities feed the generation prompt: knowledge search over the
//! brand's own documents and live web search. Both return a ready-to-inject
//! context block plus a one-line evidence summary.

pub mod formatters;
pub mod knowledge_search;
pub mod tavily;
pub mod web_search;

pub use knowledge_search::KnowledgeSearchTool;
pub use tavily::TavilyClient;
pub use web_search::WebSearchTool;

use brandforge_core::error::{Error, ToolError};
use brandforge_core::knowledge::KnowledgeStore;
use brandforge_core::search::WebSearchProvider;
use brandforge_core::tool::{Capability, ToolRegistry};
use brandforge_providers::ModelGateway;
use std::sync::Arc;

/// Create a registry with every capability whose backend is available.
///
/// A missing backend leaves its capability unregistered; asking the research
/// stage for it then records a failure instead of aborting the run.
pub fn default_registry(
    gateway: &ModelGateway,
    store: Option<Arc<dyn KnowledgeStore>>,
    search: Option<Arc<dyn WebSearchProvider>>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    if let Some(store) = store {
        registry.register(Box::new(KnowledgeSearchTool::new(gateway.clone(), store)));
    }
    if let Some(search) = search {
        registry.register(Box::new(WebSearchTool::new(gateway.clone(), search)));
    }
    registry
}

/// A gateway error raised inside a tool.
pub(crate) fn gateway_failure(capability: Capability, error: Error) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: capability.to_string(),
        reason: error.to_string(),
    }
}
