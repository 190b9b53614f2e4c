//! Research stage: runs the capabilities the planner selected.
//!
//! Tools run one after another. A failing tool never aborts the stage; it is
//! recorded under `failures` and contributes no evidence.

use brandforge_config::BrandConfig;
use brandforge_core::completion::StageUsage;
use brandforge_core::tool::{Capability, ToolRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// What one research pass gathered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    /// Every capability attempted, in order.
    pub tools_executed: Vec<Capability>,
    /// One-line digest per successful capability.
    pub evidence: BTreeMap<Capability, String>,
    /// Text blocks injected verbatim into the generation prompt.
    pub tool_contexts: BTreeMap<Capability, String>,
    /// Error text per failed capability.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<Capability, String>,
}

impl ResearchResult {
    pub fn has_evidence(&self) -> bool {
        !self.evidence.is_empty()
    }

    /// The note appended to the audit trail.
    pub fn audit_message(&self, topic: &str, brand: &str) -> String {
        let tools: Vec<String> = self
            .tools_executed
            .iter()
            .map(|t| format!("'{t}'"))
            .collect();
        let evidence = if self.evidence.is_empty() {
            "No evidence gathered".to_string()
        } else {
            self.evidence
                .iter()
                .map(|(capability, summary)| format!("{capability}: {summary}"))
                .collect::<Vec<_>>()
                .join(" | ")
        };
        let mut message = format!(
            "Executed tools=[{}] for topic='{topic}', brand='{brand}'. Evidence: {evidence}",
            tools.join(", ")
        );
        for (capability, error) in &self.failures {
            message.push_str(&format!("\nFailed {capability}: {error}"));
        }
        message
    }
}

/// A research pass result plus the model usage tools spent.
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub result: ResearchResult,
    pub usage: StageUsage,
}

/// Tool arguments for `capability`, taken from the brand's retrieval settings.
pub fn research_args(capability: Capability, topic: &str, brand: &BrandConfig) -> serde_json::Value {
    match capability {
        Capability::KnowledgeSearch => {
            let rag = &brand.retrieval.rag;
            serde_json::json!({
                "query": topic,
                "brand": brand.key(),
                "collection": rag.collection,
                "max_results": rag.max_results,
                "max_distance": rag.max_distance,
                "embedding_model": brand.models.vectorization.model,
            })
        }
        Capability::WebSearch => {
            let search = &brand.retrieval.search;
            serde_json::json!({
                "query": topic,
                "max_results": search.max_results,
                "search_depth": search.search_depth,
                "search_type": search.search_type,
                "optimizer": brand.models.search_optimization,
            })
        }
    }
}

pub struct ResearchStage {
    registry: Arc<ToolRegistry>,
}

impl ResearchStage {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub async fn run(
        &self,
        topic: &str,
        brand: &BrandConfig,
        tools: &[Capability],
    ) -> ResearchOutcome {
        let mut result = ResearchResult::default();
        let mut usage = StageUsage::default();

        for &capability in tools {
            result.tools_executed.push(capability);
            let args = research_args(capability, topic, brand);
            match self.registry.execute(capability, args).await {
                Ok(output) => {
                    info!(tool = %capability, summary = %output.summary, "Research tool succeeded");
                    usage.merge(&output.usage);
                    result.evidence.insert(capability, output.summary);
                    if !output.context.is_empty() {
                        result.tool_contexts.insert(capability, output.context);
                    }
                }
                Err(e) => {
                    warn!(tool = %capability, error = %e, "Research tool failed, continuing");
                    result.failures.insert(capability, e.to_string());
                }
            }
        }

        info!(
            executed = result.tools_executed.len(),
            evidence = result.evidence.len(),
            failures = result.failures.len(),
            "Research complete"
        );
        ResearchOutcome { result, usage }
    }
}
