//! Qdrant REST [`VectorStore`] adapter.
//!
//! Talks to a Qdrant server over its HTTP API: collection lifecycle,
//! batched point upserts (`?wait=true` so a successful response means the
//! write is durable), retrieval by id, exact counting, and similarity
//! search. The reserved metadata point (id 0) is excluded from `count`
//! and `search` with a `has_id` must-not filter.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::StoreConfig;

use super::{Payload, Point, ScoredPoint, VectorStore, METADATA_POINT_ID};

pub struct QdrantStore {
    base_url: String,
    collection: String,
    client: reqwest::Client,
}

impl QdrantStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            client,
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.base_url, self.collection, suffix
        )
    }

    /// Filter that keeps the metadata record out of counts and searches.
    fn exclude_metadata_filter() -> serde_json::Value {
        serde_json::json!({
            "must_not": [{ "has_id": [METADATA_POINT_ID] }]
        })
    }

    async fn check(op: &str, response: reqwest::Response) -> Result<serde_json::Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Qdrant {} failed ({}): {}", op, status, body);
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self) -> Result<bool> {
        let resp = self
            .client
            .get(self.collection_url("/exists"))
            .send()
            .await?;
        let json = Self::check("collection exists", resp).await?;
        Ok(json
            .pointer("/result/exists")
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn create_collection(&self, dims: usize) -> Result<()> {
        let body = serde_json::json!({
            "vectors": { "size": dims, "distance": "Cosine" }
        });
        let resp = self
            .client
            .put(self.collection_url(""))
            .json(&body)
            .send()
            .await?;
        Self::check("create collection", resp).await?;
        Ok(())
    }

    async fn drop_collection(&self) -> Result<()> {
        let resp = self
            .client
            .delete(self.collection_url(""))
            .send()
            .await?;
        Self::check("drop collection", resp).await?;
        Ok(())
    }

    async fn upsert(&self, points: &[Point]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let body = serde_json::json!({
            "points": points
                .iter()
                .map(|p| serde_json::json!({
                    "id": p.id,
                    "vector": p.vector,
                    "payload": p.payload,
                }))
                .collect::<Vec<_>>()
        });

        let resp = self
            .client
            .put(self.collection_url("/points?wait=true"))
            .json(&body)
            .send()
            .await?;
        Self::check("upsert points", resp).await?;
        Ok(())
    }

    async fn retrieve(&self, ids: &[u64]) -> Result<Vec<Point>> {
        let body = serde_json::json!({
            "ids": ids,
            "with_payload": true,
            "with_vector": true,
        });
        let resp = self
            .client
            .post(self.collection_url("/points"))
            .json(&body)
            .send()
            .await?;
        let json = Self::check("retrieve points", resp).await?;
        parse_retrieve_response(&json)
    }

    async fn count(&self) -> Result<u64> {
        let body = serde_json::json!({
            "exact": true,
            "filter": Self::exclude_metadata_filter(),
        });
        let resp = self
            .client
            .post(self.collection_url("/points/count"))
            .json(&body)
            .send()
            .await?;
        let json = Self::check("count points", resp).await?;
        json.pointer("/result/count")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| anyhow::anyhow!("Invalid Qdrant count response"))
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>> {
        let body = serde_json::json!({
            "vector": vector,
            "limit": k,
            "with_payload": true,
            "filter": Self::exclude_metadata_filter(),
        });
        let resp = self
            .client
            .post(self.collection_url("/points/search"))
            .json(&body)
            .send()
            .await?;
        let json = Self::check("search points", resp).await?;
        parse_search_response(&json)
    }
}

fn parse_payload(value: &serde_json::Value) -> Result<Payload> {
    serde_json::from_value(value.clone())
        .map_err(|e| anyhow::anyhow!("Invalid Qdrant payload: {}", e))
}

fn parse_retrieve_response(json: &serde_json::Value) -> Result<Vec<Point>> {
    let records = json
        .get("result")
        .and_then(|r| r.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Qdrant retrieve response: missing result"))?;

    let mut points = Vec::with_capacity(records.len());
    for record in records {
        let id = record
            .get("id")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| anyhow::anyhow!("Invalid Qdrant retrieve response: missing id"))?;
        let vector = record
            .get("vector")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                    .collect()
            })
            .unwrap_or_default();
        let payload = parse_payload(
            record
                .get("payload")
                .ok_or_else(|| anyhow::anyhow!("Invalid Qdrant retrieve response: missing payload"))?,
        )?;
        points.push(Point {
            id,
            vector,
            payload,
        });
    }
    Ok(points)
}

fn parse_search_response(json: &serde_json::Value) -> Result<Vec<ScoredPoint>> {
    let hits = json
        .get("result")
        .and_then(|r| r.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Qdrant search response: missing result"))?;

    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        let id = hit
            .get("id")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| anyhow::anyhow!("Invalid Qdrant search response: missing id"))?;
        let score = hit
            .get("score")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| anyhow::anyhow!("Invalid Qdrant search response: missing score"))?
            as f32;
        let payload = parse_payload(
            hit.get("payload")
                .ok_or_else(|| anyhow::anyhow!("Invalid Qdrant search response: missing payload"))?,
        )?;
        results.push(ScoredPoint { id, score, payload });
    }
    Ok(results)
}
