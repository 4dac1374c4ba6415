use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_path")]
    pub path: PathBuf,
    /// File extension considered part of the corpus (no leading dot).
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: default_corpus_path(),
            extension: default_extension(),
        }
    }
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("./corpus")
}
fn default_extension() -> String {
    "pdf".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Points accumulated before a flush to the store during indexing.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            collection: default_collection(),
            batch_size: default_batch_size(),
            timeout_secs: default_store_timeout(),
        }
    }
}

fn default_store_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_collection() -> String {
    "techshop_docs".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_store_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    800
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_dims(),
            max_retries: default_max_retries(),
            timeout_secs: default_embed_timeout(),
        }
    }
}

fn default_embedding_model() -> String {
    "gemini-embedding-001".to_string()
}
fn default_dims() -> usize {
    768
}
fn default_max_retries() -> u32 {
    5
}
fn default_embed_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

/// Every recognized generation option, with defaults and validated ranges.
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_gen_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_gen_timeout")]
    pub timeout_secs: u64,
    /// Overrides the built-in behavioral instruction when set.
    #[serde(default)]
    pub system_instruction: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_gen_top_k(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_gen_timeout(),
            system_instruction: None,
        }
    }
}

fn default_generation_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}
fn default_temperature() -> f64 {
    0.3
}
fn default_top_p() -> f64 {
    0.9
}
fn default_gen_top_k() -> u32 {
    40
}
fn default_max_output_tokens() -> u32 {
    1024
}
fn default_gen_timeout() -> u64 {
    60
}

/// Default configuration file location, used when `--config` is not
/// passed.
pub const DEFAULT_CONFIG_PATH: &str = "./config/docqa.toml";

/// Resolve the effective configuration.
///
/// An explicitly passed path must exist and parse. When no path was
/// passed, the file at `fallback` is loaded if present; a missing
/// fallback is not an error and yields the built-in defaults.
pub fn load_config_or_default(explicit: Option<&Path>, fallback: &Path) -> Result<Config> {
    match explicit {
        Some(path) => load_config(path),
        None if fallback.is_file() => load_config(fallback),
        None => Ok(Config::default()),
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be < chunking.chunk_size");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.store.batch_size < 1 {
        anyhow::bail!("store.batch_size must be >= 1");
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }
    if !(0.0..=1.0).contains(&config.generation.top_p) {
        anyhow::bail!("generation.top_p must be in [0.0, 1.0]");
    }
    if config.generation.top_k < 1 {
        anyhow::bail!("generation.top_k must be >= 1");
    }
    if config.generation.max_output_tokens < 1 {
        anyhow::bail!("generation.max_output_tokens must be >= 1");
    }
    Ok(())
}
