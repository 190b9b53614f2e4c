//! In-memory knowledge store, for tests and locally seeded runs.

use crate::vector::cosine_distance;
use async_trait::async_trait;
use brandforge_core::error::KnowledgeError;
use brandforge_core::knowledge::{KnowledgeChunk, KnowledgeHit, KnowledgeQuery, KnowledgeStore};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Collections of pre-embedded chunks, ranked by cosine distance.
///
/// Every collection keeps the dimension of its first chunk; later chunks and
/// queries must match it.
#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    collections: RwLock<HashMap<String, Vec<KnowledgeChunk>>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a seed file: a JSON object mapping collection names to chunks.
    pub fn from_seed_file(path: &Path) -> Result<Self, KnowledgeError> {
        let seed_error = |reason: String| KnowledgeError::Seed {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| seed_error(e.to_string()))?;
        let seed: BTreeMap<String, Vec<KnowledgeChunk>> =
            serde_json::from_str(&content).map_err(|e| seed_error(e.to_string()))?;

        let mut collections = HashMap::new();
        for (name, chunks) in seed {
            let mut stored = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                insert_chunk(&mut stored, chunk)?;
            }
            collections.insert(name, stored);
        }

        info!(
            path = %path.display(),
            collections = collections.len(),
            "Knowledge store seeded"
        );
        Ok(Self {
            collections: RwLock::new(collections),
        })
    }

    /// Number of chunks in `collection`.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }
}

/// Insert or replace `chunk` by id, enforcing the collection's dimension.
fn insert_chunk(stored: &mut Vec<KnowledgeChunk>, mut chunk: KnowledgeChunk) -> Result<(), KnowledgeError> {
    if let Some(first) = stored.first() {
        if first.embedding.len() != chunk.embedding.len() {
            return Err(KnowledgeError::DimensionMismatch {
                expected: first.embedding.len(),
                actual: chunk.embedding.len(),
            });
        }
    }
    if chunk.id.is_empty() {
        chunk.id = Uuid::new_v4().to_string();
    }
    match stored.iter_mut().find(|c| c.id == chunk.id) {
        Some(existing) => *existing = chunk,
        None => stored.push(chunk),
    }
    Ok(())
}

fn matches_filter(chunk: &KnowledgeChunk, filter: &BTreeMap<String, String>) -> bool {
    filter
        .iter()
        .all(|(key, value)| chunk.metadata.get(key) == Some(value))
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn query(&self, query: KnowledgeQuery) -> Result<Vec<KnowledgeHit>, KnowledgeError> {
        let collections = self.collections.read().await;
        let chunks = collections
            .get(&query.collection)
            .ok_or_else(|| KnowledgeError::UnknownCollection(query.collection.clone()))?;

        if let Some(first) = chunks.first() {
            if first.embedding.len() != query.embedding.len() {
                return Err(KnowledgeError::DimensionMismatch {
                    expected: first.embedding.len(),
                    actual: query.embedding.len(),
                });
            }
        }

        let mut hits: Vec<KnowledgeHit> = chunks
            .iter()
            .filter(|c| matches_filter(c, &query.metadata_filter))
            .map(|c| KnowledgeHit {
                id: c.id.clone(),
                text: c.text.clone(),
                distance: cosine_distance(&c.embedding, &query.embedding),
                metadata: c.metadata.clone(),
            })
            .filter(|h| query.max_distance.is_none_or(|max| h.distance <= max))
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(query.k);

        debug!(
            collection = %query.collection,
            hits = hits.len(),
            "Knowledge query complete"
        );
        Ok(hits)
    }

    async fn upsert(
        &self,
        collection: &str,
        chunks: Vec<KnowledgeChunk>,
    ) -> Result<usize, KnowledgeError> {
        let mut collections = self.collections.write().await;
        let stored = collections.entry(collection.to_string()).or_default();

        // Validate the whole batch before touching the collection.
        let mut staged = stored.clone();
        let count = chunks.len();
        for chunk in chunks {
            insert_chunk(&mut staged, chunk)?;
        }
        *stored = staged;
        Ok(count)
    }
}
