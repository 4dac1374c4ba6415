//! Vector storage abstraction.
//!
//! The [`VectorStore`] trait wraps collection lifecycle, point operations,
//! and similarity search, enabling pluggable backends: the Qdrant REST
//! adapter for production ([`qdrant::QdrantStore`]) and a brute-force
//! in-memory implementation for tests ([`memory::InMemoryStore`]).
//!
//! Point id `0` is reserved for the metadata record holding the corpus
//! fingerprint and indexing timestamp; content chunks are numbered from 1.
//! Upserts are idempotent per point id — re-upserting overwrites rather
//! than duplicates, which is what makes metadata refresh and
//! crash-recovery-by-rebuild safe.

pub mod memory;
pub mod qdrant;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Reserved point id for the metadata record.
pub const METADATA_POINT_ID: u64 = 0;

/// Payload stored alongside a vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// A content chunk from one corpus document.
    Chunk {
        filename: String,
        chunk_index: usize,
        total_chunks: usize,
        text: String,
        text_length: usize,
    },
    /// The reserved record at point id 0.
    Metadata {
        corpus_hash: String,
        indexed_at: String,
    },
}

/// The persisted unit: id, embedding, payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A similarity search hit, ranked by score.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: u64,
    pub score: f32,
    pub payload: Payload,
}

/// Abstract vector store backend.
///
/// Implementations must be `Send + Sync`. All operations are async via
/// `async-trait`; the in-memory implementation returns immediately-ready
/// futures.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether the configured collection exists.
    async fn collection_exists(&self) -> Result<bool>;

    /// Create the collection with the given vector dimension and a
    /// cosine distance metric.
    async fn create_collection(&self, dims: usize) -> Result<()>;

    /// Drop the collection and everything in it.
    async fn drop_collection(&self) -> Result<()>;

    /// Insert or overwrite points by id.
    async fn upsert(&self, points: &[Point]) -> Result<()>;

    /// Fetch points by id; ids with no point are silently absent from
    /// the result.
    async fn retrieve(&self, ids: &[u64]) -> Result<Vec<Point>>;

    /// Number of content points (the metadata record is not counted).
    async fn count(&self) -> Result<u64>;

    /// Top-`k` cosine similarity search over content points, highest
    /// score first. The metadata record never appears in results.
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>>;
}

/// Cosine similarity between two vectors. Returns `0.0` for empty or
/// mismatched-length inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
