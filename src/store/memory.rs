//! In-memory [`VectorStore`] implementation for tests.
//!
//! Holds the collection behind `std::sync::RwLock`; search is brute-force
//! cosine similarity over all content points.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{cosine_similarity, Point, ScoredPoint, VectorStore, METADATA_POINT_ID};

struct Collection {
    dims: usize,
    points: BTreeMap<u64, Point>,
}

/// In-memory store. The collection starts absent, matching a fresh
/// backend.
pub struct InMemoryStore {
    collection: RwLock<Option<Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collection: RwLock::new(None),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn collection_exists(&self) -> Result<bool> {
        Ok(self.collection.read().unwrap().is_some())
    }

    async fn create_collection(&self, dims: usize) -> Result<()> {
        let mut guard = self.collection.write().unwrap();
        if guard.is_some() {
            bail!("collection already exists");
        }
        *guard = Some(Collection {
            dims,
            points: BTreeMap::new(),
        });
        Ok(())
    }

    async fn drop_collection(&self) -> Result<()> {
        *self.collection.write().unwrap() = None;
        Ok(())
    }

    async fn upsert(&self, points: &[Point]) -> Result<()> {
        let mut guard = self.collection.write().unwrap();
        let collection = match guard.as_mut() {
            Some(c) => c,
            None => bail!("collection does not exist"),
        };
        for point in points {
            if point.vector.len() != collection.dims {
                bail!(
                    "vector dimension mismatch: expected {}, got {}",
                    collection.dims,
                    point.vector.len()
                );
            }
            collection.points.insert(point.id, point.clone());
        }
        Ok(())
    }

    async fn retrieve(&self, ids: &[u64]) -> Result<Vec<Point>> {
        let guard = self.collection.read().unwrap();
        let collection = match guard.as_ref() {
            Some(c) => c,
            None => bail!("collection does not exist"),
        };
        Ok(ids
            .iter()
            .filter_map(|id| collection.points.get(id).cloned())
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        let guard = self.collection.read().unwrap();
        let collection = match guard.as_ref() {
            Some(c) => c,
            None => bail!("collection does not exist"),
        };
        Ok(collection
            .points
            .keys()
            .filter(|&&id| id != METADATA_POINT_ID)
            .count() as u64)
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>> {
        let guard = self.collection.read().unwrap();
        let collection = match guard.as_ref() {
            Some(c) => c,
            None => bail!("collection does not exist"),
        };

        let mut hits: Vec<ScoredPoint> = collection
            .points
            .values()
            .filter(|p| p.id != METADATA_POINT_ID)
            .map(|p| ScoredPoint {
                id: p.id,
                score: cosine_similarity(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }
}
