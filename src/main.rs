//! # DocQA CLI (`docqa`)
//!
//! The `docqa` binary answers questions over a local document corpus
//! using retrieval-augmented generation: documents are chunked, embedded,
//! and stored in Qdrant; questions retrieve the closest chunks and a
//! Gemini model produces a grounded answer.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa index` | Fingerprint the corpus and rebuild the index if it changed |
//! | `docqa search "<query>"` | Show the top-ranked chunks for a query |
//! | `docqa ask "<question>"` | Retrieve context and generate a grounded answer |
//! | `docqa status` | Compare the stored index against the corpus on disk |
//!
//! ## Examples
//!
//! ```bash
//! # Index the corpus (no-op when nothing changed)
//! docqa index
//!
//! # Rebuild even if the fingerprint matches
//! docqa index --force
//!
//! # Inspect retrieval without generating
//! docqa search "warranty period" --limit 3
//!
//! # Ask a question
//! docqa ask "How do I return a product?"
//! ```
//!
//! The Gemini API key is read from the `GEMINI_API_KEY` environment
//! variable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use docqa::config::{self, DEFAULT_CONFIG_PATH};
use docqa::embedding::GeminiEmbedder;
use docqa::engine::Engine;
use docqa::generate::GeminiGenerator;
use docqa::index::{self, IndexOutcome};
use docqa::retrieve;
use docqa::store::qdrant::QdrantStore;

/// DocQA — retrieval-augmented question answering over local documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Every setting has a default; a missing file section falls back
/// to it.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "DocQA — retrieval-augmented question answering over a local document corpus",
    version,
    long_about = "DocQA indexes a directory of documents into a Qdrant vector collection \
    (extract, chunk, embed) and answers questions grounded in the indexed content. \
    The index is rebuilt automatically whenever the corpus fingerprint changes."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When omitted, `./config/docqa.toml` is loaded if it exists and
    /// built-in defaults apply otherwise. An explicitly passed path must
    /// exist. Corpus, store, chunking, embedding, retrieval, and
    /// generation settings are read from the file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Bring the index in line with the corpus.
    ///
    /// Computes the corpus fingerprint and compares it with the one
    /// stored in the collection. On mismatch the collection is dropped
    /// and rebuilt from scratch; on match nothing is re-embedded.
    Index {
        /// Rebuild even when the fingerprint matches.
        #[arg(long)]
        force: bool,
    },

    /// Show the top-ranked chunks for a query.
    ///
    /// Embeds the query and runs a similarity search, printing each hit
    /// with its score, source file, and chunk text. Does not call the
    /// generation model.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results (defaults to retrieval.top_k).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a question grounded in the indexed corpus.
    ///
    /// Ensures the index is current, retrieves the closest chunks, and
    /// generates an answer confined to their content.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Compare the stored index against the corpus on disk.
    ///
    /// Prints the collection state, content point count, stored and
    /// current fingerprints, and when the index was last built.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg =
        config::load_config_or_default(cli.config.as_deref(), Path::new(DEFAULT_CONFIG_PATH))?;

    // Only `ask` needs the full client set; `status` works with the
    // store alone, so `GEMINI_API_KEY` is not required for it.
    let store = QdrantStore::new(&cfg.store)?;

    match cli.command {
        Commands::Index { force } => {
            let embedder = GeminiEmbedder::new(&cfg.embedding)?;
            match index::ensure_indexed(&store, &embedder, &cfg, force).await? {
                IndexOutcome::UpToDate => {
                    println!("Index is up to date.");
                }
                IndexOutcome::Rebuilt(stats) => {
                    println!(
                        "Index rebuilt: {} document(s), {} chunk(s) ({} document(s) skipped, {} chunk(s) skipped).",
                        stats.documents_indexed,
                        stats.chunks_indexed,
                        stats.documents_skipped,
                        stats.chunks_skipped
                    );
                }
            }
        }
        Commands::Search { query, limit } => {
            let embedder = GeminiEmbedder::new(&cfg.embedding)?;
            let k = limit.unwrap_or(cfg.retrieval.top_k);
            let hits = retrieve::retrieve(&store, &embedder, &query, k).await;
            if hits.is_empty() {
                println!("No results.");
            } else {
                for (rank, hit) in hits.iter().enumerate() {
                    println!(
                        "{}. [{:.4}] {} (chunk {})",
                        rank + 1,
                        hit.score,
                        hit.filename,
                        hit.chunk_index
                    );
                    println!("   {}", hit.text.replace('\n', "\n   "));
                }
            }
        }
        Commands::Ask { question } => {
            let embedder = Arc::new(GeminiEmbedder::new(&cfg.embedding)?);
            let generator = Arc::new(GeminiGenerator::new(&cfg.generation)?);
            let engine = Engine::new(cfg, Arc::new(store), embedder, generator);
            engine.ensure_indexed(false).await?;
            let answer = engine.answer(&question, &[]).await;
            println!("{}", answer);
        }
        Commands::Status => {
            let status = index::status(&store, &cfg).await?;
            if !status.collection_exists {
                println!("Collection does not exist; run `docqa index`.");
            } else {
                println!("Content points: {}", status.content_points);
                match (&status.stored_fingerprint, &status.indexed_at) {
                    (Some(hash), Some(at)) => {
                        println!("Indexed at:     {}", at);
                        println!("Stored hash:    {}", hash);
                    }
                    _ => println!("No metadata record found."),
                }
                println!("Corpus hash:    {}", status.current_fingerprint);
                if status.up_to_date() {
                    println!("Index is up to date.");
                } else {
                    println!("Index is stale; run `docqa index`.");
                }
            }
        }
    }

    Ok(())
}
