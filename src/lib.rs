//! Retrieval-augmented question answering over a local document corpus.
//!
//! The pipeline has two halves:
//!
//! - **Indexing** (startup, blocking): fingerprint the corpus, and if it
//!   changed since the last run, wipe the vector collection and rebuild
//!   it end to end: extract each document, chunk the text with overlap,
//!   embed each chunk remotely, and upsert everything in batches.
//! - **Querying** (stateless): embed the question, similarity-search the
//!   collection, assemble a source-attributed context, and generate a
//!   grounded answer.
//!
//! Module map:
//!
//! | Module        | Responsibility                                      |
//! |---------------|-----------------------------------------------------|
//! | [`config`]    | TOML configuration with per-field defaults          |
//! | [`fingerprint`] | Corpus change detection (SHA-256 over sorted files) |
//! | [`extract`]   | Document text extraction (PDF and plain text)       |
//! | [`chunk`]     | Separator-priority text splitting with overlap      |
//! | [`embedding`] | [`embedding::Embedder`] trait + Gemini client       |
//! | [`store`]     | [`store::VectorStore`] trait, Qdrant + in-memory    |
//! | [`index`]     | Change detection and full rebuilds                  |
//! | [`retrieve`]  | Query-time similarity retrieval                     |
//! | [`context`]   | Context assembly, prompt building, fallbacks        |
//! | [`generate`]  | [`generate::Generator`] trait + Gemini client       |
//! | [`engine`]    | Facade wiring the pipeline together                 |

pub mod chunk;
pub mod config;
pub mod context;
pub mod embedding;
pub mod engine;
pub mod extract;
pub mod fingerprint;
pub mod generate;
pub mod index;
pub mod retrieve;
pub mod store;
