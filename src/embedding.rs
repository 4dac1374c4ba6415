//! Embedding client abstraction and the Gemini implementation.
//!
//! The [`Embedder`] trait is the seam between the indexing/retrieval
//! pipeline and the remote embedding model, so tests can substitute a
//! deterministic embedder. [`GeminiEmbedder`] calls the Gemini
//! `embedContent` endpoint with retry and exponential backoff:
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! An embedding failure is a recoverable sentinel (`Err`): callers drop
//! the affected unit. It is never substituted with a zero vector.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Turns text into a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text, requesting exactly `dims()` components.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// The vector dimensionality this embedder produces.
    fn dims(&self) -> usize;
}

/// Embedding client for the Gemini API.
///
/// Requires the `GEMINI_API_KEY` environment variable.
pub struct GeminiEmbedder {
    model: String,
    dims: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        if std::env::var("GEMINI_API_KEY").is_err() {
            bail!("GEMINI_API_KEY environment variable not set");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY not set"))?;

        let url = format!(
            "{}/models/{}:embedContent",
            GEMINI_API_BASE, self.model
        );

        let body = serde_json::json!({
            "content": { "parts": [{ "text": text }] },
            "outputDimensionality": self.dims,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("x-goog-api-key", &api_key)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_embed_response(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Gemini embedding error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Gemini embedding error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

/// Parse the `embedContent` response JSON into a vector.
fn parse_embed_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let values = json
        .get("embedding")
        .and_then(|e| e.get("values"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: missing embedding.values"))?;

    Ok(values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}
