//! Query-time retrieval: embed the question, search the store, surface
//! the best-matching chunks.
//!
//! Retrieval never fails the caller. Any error along the way (embedding
//! the query, searching the store) is logged and reported as an empty
//! result set, which downstream answering treats as insufficient
//! grounding.

use tracing::warn;

use crate::embedding::Embedder;
use crate::store::{Payload, VectorStore};

/// A chunk returned from similarity search, ready for context assembly.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub text: String,
    pub filename: String,
    pub chunk_index: usize,
    pub score: f32,
}

/// Retrieve the top-`k` chunks most similar to `query`, highest score
/// first. Returns an empty vec on any failure.
pub async fn retrieve(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
) -> Vec<RetrievedChunk> {
    let vector = match embedder.embed(query).await {
        Ok(v) => v,
        Err(e) => {
            warn!("query embedding failed: {}", e);
            return Vec::new();
        }
    };

    let hits = match store.search(&vector, k).await {
        Ok(hits) => hits,
        Err(e) => {
            warn!("similarity search failed: {}", e);
            return Vec::new();
        }
    };

    hits.into_iter()
        .filter_map(|hit| match hit.payload {
            Payload::Chunk {
                filename,
                chunk_index,
                text,
                ..
            } => Some(RetrievedChunk {
                text,
                filename,
                chunk_index,
                score: hit.score,
            }),
            Payload::Metadata { .. } => None,
        })
        .collect()
}
