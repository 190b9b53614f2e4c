//! Tool trait: the abstraction over research capabilities.
//!
//! The capability vocabulary is closed: a planner may only ever select from
//! [`Capability::ALL`], and the registry is keyed by it.

use crate::completion::StageUsage;
use crate::error::ToolError;
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A named research capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Vector search over the brand's own documents.
    KnowledgeSearch,
    /// Live web search.
    WebSearch,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::KnowledgeSearch, Capability::WebSearch];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::KnowledgeSearch => "knowledge_search",
            Capability::WebSearch => "web_search",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "knowledge_search" => Ok(Capability::KnowledgeSearch),
            "web_search" => Ok(Capability::WebSearch),
            other => Err(ToolError::NotFound(other.to_string())),
        }
    }
}

/// What a capability produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// One-line evidence digest ("Found 3 web sources").
    pub summary: String,

    /// Text block injected verbatim into the generation prompt.
    pub context: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Model calls the tool made on its own (embeddings, query rewriting)
    #[serde(default)]
    pub usage: StageUsage,
}

/// The core Tool trait.
///
/// Each research capability implements this trait and is registered in the
/// [`ToolRegistry`] the research stage executes from.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Which capability this tool provides.
    fn capability(&self) -> Capability;

    /// A description of what this tool does (sent to the planner).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolDefinition for the planner.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.capability().as_str().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available research tools.
pub struct ToolRegistry {
    tools: BTreeMap<Capability, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool for the same capability.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.capability(), tool);
    }

    /// Get a tool by capability.
    pub fn get(&self, capability: Capability) -> Option<&dyn Tool> {
        self.tools.get(&capability).map(|t| t.as_ref())
    }

    /// Tool definitions for the planner, in capability order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Execute one capability.
    pub async fn execute(
        &self,
        capability: Capability,
        arguments: serde_json::Value,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(&capability)
            .ok_or_else(|| ToolError::NotFound(capability.to_string()))?;
        tool.execute(arguments).await
    }

    /// Registered capabilities, in order.
    pub fn capabilities(&self) -> Vec<Capability> {
        self.tools.keys().copied().collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
