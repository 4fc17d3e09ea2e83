// LanceDB vector database module
// Handles document storage and nearest-neighbor retrieval

#[cfg(test)]
mod tests;

pub mod vector_store;

use serde::{Deserialize, Serialize};

pub use vector_store::VectorStore;

/// Document stored in the pattern collection. Immutable after
/// insertion; removed only by a collection reset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedDocument {
    /// Unique identifier within the collection
    pub id: String,
    /// Description plus joined code blocks, exactly as embedded
    pub text: String,
    /// L2-normalized embedding of `text`
    pub vector: Vec<f32>,
    /// Metadata stored alongside the document
    pub metadata: PatternMetadata,
}

/// Metadata carried with each document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternMetadata {
    /// Pattern identifier from the source catalog; not unique, unlike
    /// the document id.
    pub source_id: String,
    /// Timestamp recorded when the document was ingested
    pub ingested_at: String,
}

/// One retrieval hit. Result lists are ordered by ascending distance,
/// nearest first.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub text: String,
    pub metadata: PatternMetadata,
    pub distance: f32,
}
