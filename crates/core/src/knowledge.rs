//! Knowledge store trait: read queries over pre-embedded brand documents.
//!
//! The engine never manages persistence, indexing or collection lifecycle.
//! It issues similarity queries, and ingestion pushes pre-embedded batches.

use crate::error::KnowledgeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A similarity query against one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeQuery {
    /// Collection to search
    pub collection: String,

    /// Query embedding
    pub embedding: Vec<f32>,

    /// Maximum number of hits
    #[serde(default = "default_k")]
    pub k: usize,

    /// Every entry must match these metadata values exactly
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata_filter: BTreeMap<String, String>,

    /// Hits farther than this are dropped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<f32>,
}

fn default_k() -> usize {
    5
}

/// A ranked query hit, closest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeHit {
    pub id: String,
    pub text: String,
    /// Distance to the query (0 = identical)
    pub distance: f32,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// A pre-embedded chunk written during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// The query contract the research stage relies on.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// The store name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Ranked hits for `query`, closest first.
    async fn query(&self, query: KnowledgeQuery) -> Result<Vec<KnowledgeHit>, KnowledgeError>;

    /// Write a batch of pre-embedded chunks. Returns how many were stored.
    async fn upsert(
        &self,
        collection: &str,
        chunks: Vec<KnowledgeChunk>,
    ) -> Result<usize, KnowledgeError>;
}
