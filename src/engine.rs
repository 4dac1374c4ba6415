//! Top-level engine tying the pipeline together.
//!
//! Holds the configured store, embedder, and generator behind their trait
//! objects, plus a rebuild guard so concurrent callers cannot start two
//! rebuilds of the same collection. Query paths are stateless and do not
//! take the guard.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::context::{self, ChatTurn, DEFAULT_SYSTEM_INSTRUCTION};
use crate::embedding::Embedder;
use crate::generate::Generator;
use crate::index::{self, IndexOutcome, IndexStatus};
use crate::retrieve::{self, RetrievedChunk};
use crate::store::VectorStore;

pub struct Engine {
    config: Config,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    rebuild_guard: Mutex<()>,
}

impl Engine {
    pub fn new(
        config: Config,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
            generator,
            rebuild_guard: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bring the index in line with the corpus, rebuilding if needed.
    /// Serialized: a second caller waits for the first to finish, then
    /// sees an up-to-date index.
    pub async fn ensure_indexed(&self, force: bool) -> Result<IndexOutcome> {
        let _guard = self.rebuild_guard.lock().await;
        index::ensure_indexed(
            self.store.as_ref(),
            self.embedder.as_ref(),
            &self.config,
            force,
        )
        .await
    }

    /// Top-k similarity retrieval for a query. Empty on any failure.
    pub async fn retrieve(&self, query: &str) -> Vec<RetrievedChunk> {
        retrieve::retrieve(
            self.store.as_ref(),
            self.embedder.as_ref(),
            query,
            self.config.retrieval.top_k,
        )
        .await
    }

    /// Retrieve context for `question` and generate a grounded answer.
    /// Never returns an error; failures map to fixed fallback answers.
    pub async fn answer(&self, question: &str, recent_turns: &[ChatTurn]) -> String {
        let chunks = self.retrieve(question).await;
        let system_instruction = self
            .config
            .generation
            .system_instruction
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_INSTRUCTION);

        context::respond(
            self.generator.as_ref(),
            system_instruction,
            &chunks,
            recent_turns,
            question,
        )
        .await
    }

    /// Inspect the stored index against the corpus on disk without
    /// modifying anything.
    pub async fn status(&self) -> Result<IndexStatus> {
        index::status(self.store.as_ref(), &self.config).await
    }
}
