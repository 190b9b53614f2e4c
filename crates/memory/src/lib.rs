//! Knowledge store implementations for brandforge.

pub mod in_memory;
pub mod vector;

pub use in_memory::InMemoryKnowledgeStore;
pub use vector::{cosine_distance, cosine_similarity};
