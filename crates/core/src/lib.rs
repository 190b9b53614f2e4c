//! # brandforge core
//!
//! Domain types, traits, and error definitions for the brandforge content
//! engine. This crate has **no framework dependencies**: it defines the
//! domain model that all other crates implement against.
//!
//! Every external collaborator (text-generation provider, knowledge store,
//! web search, research tool) is a trait here. Implementations live in their
//! respective crates, which keeps the stages testable with scripted stubs.

pub mod completion;
pub mod error;
pub mod knowledge;
pub mod message;
pub mod provider;
pub mod search;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use completion::{CompletionResult, EmbeddingResult, StageUsage};
pub use error::{Error, Result};
pub use knowledge::{KnowledgeChunk, KnowledgeHit, KnowledgeQuery, KnowledgeStore};
pub use message::{Message, Role};
pub use provider::{
    Provider, ProviderRequest, ProviderResponse, ResponseSchema, ToolCall, ToolDefinition, Usage,
};
pub use search::{SearchDepth, SearchType, WebSearchHit, WebSearchProvider, WebSearchQuery};
pub use tool::{Capability, Tool, ToolOutput, ToolRegistry};
