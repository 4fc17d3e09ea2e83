// Retrieval service
// Encodes a live query and returns its nearest patterns


use tracing::debug;

use crate::database::lancedb::{PatternMatch, VectorStore};
use crate::embeddings::Embedder;
use crate::{PatternError, Result};

/// Ranked matches for one query, nearest first. Transient; never
/// persisted.
pub type QueryResult = Vec<PatternMatch>;

/// Encode `query` and return up to `top_k` nearest patterns.
///
/// The collection must already be opened via
/// [`VectorStore::open_collection`], which separates "ingestion never
/// ran" from "collection exists but is empty"; an empty result here is
/// a valid outcome, not an error.
#[inline]
pub async fn query_patterns<E: Embedder>(
    embedder: &mut E,
    store: &VectorStore,
    query: &str,
    top_k: usize,
) -> Result<QueryResult> {
    if top_k == 0 {
        return Err(PatternError::InvalidTopK);
    }

    debug!("Encoding query (top_k: {top_k})");
    let query_texts = [query.to_string()];
    let mut vectors = embedder.encode(&query_texts)?;
    let Some(vector) = vectors.pop() else {
        return Err(PatternError::Embedding(
            "Embedder returned no vector for the query".to_string(),
        ));
    };

    store.query(&vector, top_k).await
}
