//! Answer generation client abstraction and the Gemini implementation.
//!
//! The [`Generator`] trait mirrors [`crate::embedding::Embedder`]: a seam
//! so tests can substitute a canned model. Failures are classified once,
//! at this boundary, into [`GenerationError`]; callers branch on the
//! variant instead of inspecting transport details.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::config::GenerationConfig;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Error)]
pub enum GenerationError {
    /// API quota or rate limit exhausted (HTTP 429).
    #[error("generation quota exhausted")]
    Quota,

    /// The request timed out.
    #[error("generation request timed out")]
    Timeout,

    /// Network or server-side transport failure.
    #[error("generation transport error: {0}")]
    Transport(String),

    /// Anything else: malformed responses, unexpected client errors.
    #[error("generation failed: {0}")]
    Unknown(String),
}

/// Produces an answer from a system instruction and an assembled prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        system_instruction: &str,
        prompt: &str,
    ) -> Result<String, GenerationError>;
}

/// Generation client for the Gemini `generateContent` endpoint.
///
/// Requires the `GEMINI_API_KEY` environment variable.
pub struct GeminiGenerator {
    config: GenerationConfig,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        if std::env::var("GEMINI_API_KEY").is_err() {
            anyhow::bail!("GEMINI_API_KEY environment variable not set");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(
        &self,
        system_instruction: &str,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| GenerationError::Unknown("GEMINI_API_KEY not set".to_string()))?;

        let url = format!(
            "{}/models/{}:generateContent",
            GEMINI_API_BASE, self.config.model
        );

        let body = serde_json::json!({
            "system_instruction": {
                "parts": [{ "text": system_instruction }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "topP": self.config.top_p,
                "topK": self.config.top_k,
                "maxOutputTokens": self.config.max_output_tokens,
            }
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(GenerationError::Quota);
        }
        if status.is_server_error() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Transport(format!(
                "{}: {}",
                status, body_text
            )));
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Unknown(format!(
                "{}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Unknown(e.to_string()))?;
        parse_generate_response(&json)
    }
}

fn classify_transport_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Transport(e.to_string())
    }
}

/// Extract the answer text from a `generateContent` response,
/// concatenating the first candidate's parts.
fn parse_generate_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| GenerationError::Unknown("response has no candidates".to_string()))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        return Err(GenerationError::Unknown(
            "response candidate has no text".to_string(),
        ));
    }

    Ok(text)
}
