//! Indexing orchestration: change detection and full rebuilds.
//!
//! On every run the indexer fingerprints the corpus and compares it with
//! the fingerprint stored in the collection's metadata record (point id
//! 0). Any difference — or a missing collection, or an unreadable
//! metadata record — triggers a full wipe-and-rebuild; there is no
//! incremental path.
//!
//! Within a rebuild, extraction or embedding failures for one document or
//! chunk are logged and skipped. Store failures are fatal: the run aborts
//! and the collection is left as-is. That partial state self-heals — its
//! metadata record is missing or stale, so the next run rebuilds from
//! scratch.

use anyhow::Result;
use tracing::{info, warn};

use crate::chunk::split_text;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::extract::extract_file;
use crate::fingerprint::{corpus_fingerprint, list_corpus_files};
use crate::store::{Payload, Point, VectorStore, METADATA_POINT_ID};

/// Result of an indexing check.
#[derive(Debug)]
pub enum IndexOutcome {
    /// Stored fingerprint matched the corpus; nothing was re-embedded.
    UpToDate,
    /// The collection was dropped and rebuilt.
    Rebuilt(RebuildStats),
}

#[derive(Debug, Default)]
pub struct RebuildStats {
    pub documents_indexed: usize,
    pub documents_skipped: usize,
    pub chunks_indexed: usize,
    pub chunks_skipped: usize,
    pub fingerprint: String,
}

/// Check the corpus against the stored fingerprint and rebuild the
/// collection if they differ (or if `force` is set).
pub async fn ensure_indexed(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    config: &Config,
    force: bool,
) -> Result<IndexOutcome> {
    let current = corpus_fingerprint(&config.corpus.path, &config.corpus.extension)?;

    if !force && store.collection_exists().await? {
        match stored_metadata(store).await {
            Ok(Some((stored, _))) if stored == current => {
                info!(fingerprint = %current, "corpus unchanged, index up to date");
                return Ok(IndexOutcome::UpToDate);
            }
            Ok(_) => {
                info!("corpus fingerprint changed, rebuilding index");
            }
            Err(e) => {
                warn!("could not read stored fingerprint, rebuilding index: {}", e);
            }
        }
    }

    let stats = rebuild(store, embedder, config, current).await?;
    Ok(IndexOutcome::Rebuilt(stats))
}

/// Snapshot of the stored index relative to the corpus on disk.
#[derive(Debug)]
pub struct IndexStatus {
    pub collection_exists: bool,
    pub content_points: u64,
    pub stored_fingerprint: Option<String>,
    pub indexed_at: Option<String>,
    pub current_fingerprint: String,
}

impl IndexStatus {
    /// Whether the stored index matches the corpus on disk.
    pub fn up_to_date(&self) -> bool {
        self.stored_fingerprint.as_deref() == Some(self.current_fingerprint.as_str())
    }
}

/// Inspect the stored index against the corpus without modifying
/// anything. Needs only the store; no embedding or generation client is
/// involved.
pub async fn status(store: &dyn VectorStore, config: &Config) -> Result<IndexStatus> {
    let current_fingerprint =
        corpus_fingerprint(&config.corpus.path, &config.corpus.extension)?;

    if !store.collection_exists().await? {
        return Ok(IndexStatus {
            collection_exists: false,
            content_points: 0,
            stored_fingerprint: None,
            indexed_at: None,
            current_fingerprint,
        });
    }

    let content_points = store.count().await?;
    let (stored_fingerprint, indexed_at) = match stored_metadata(store).await? {
        Some((hash, at)) => (Some(hash), Some(at)),
        None => (None, None),
    };

    Ok(IndexStatus {
        collection_exists: true,
        content_points,
        stored_fingerprint,
        indexed_at,
        current_fingerprint,
    })
}

/// Read the metadata record, returning `(corpus_hash, indexed_at)` if a
/// valid one is present.
pub async fn stored_metadata(store: &dyn VectorStore) -> Result<Option<(String, String)>> {
    let points = store.retrieve(&[METADATA_POINT_ID]).await?;
    Ok(points.into_iter().find_map(|p| match p.payload {
        Payload::Metadata {
            corpus_hash,
            indexed_at,
        } => Some((corpus_hash, indexed_at)),
        _ => None,
    }))
}

/// Drop and recreate the collection, then index every corpus document.
///
/// Documents are processed in filename-sorted order; content point ids
/// are assigned sequentially starting at 1 across the whole run. Points
/// are flushed to the store every `batch_size` accumulated, with the
/// remainder flushed at the end, followed by the metadata record.
async fn rebuild(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    config: &Config,
    fingerprint: String,
) -> Result<RebuildStats> {
    if store.collection_exists().await? {
        store.drop_collection().await?;
    }
    store.create_collection(config.embedding.dims).await?;

    let files = list_corpus_files(&config.corpus.path, &config.corpus.extension)?;
    info!(documents = files.len(), "indexing corpus");

    let mut stats = RebuildStats {
        fingerprint: fingerprint.clone(),
        ..Default::default()
    };
    let mut batch: Vec<Point> = Vec::new();
    let mut next_id: u64 = 1;

    for path in &files {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let text = match extract_file(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(document = %filename, "extraction failed, skipping: {}", e);
                stats.documents_skipped += 1;
                continue;
            }
        };
        if text.trim().is_empty() {
            warn!(document = %filename, "no text extracted, skipping");
            stats.documents_skipped += 1;
            continue;
        }

        let chunks = split_text(&text, config.chunking.chunk_size, config.chunking.overlap);
        let total_chunks = chunks.len();

        for (chunk_index, chunk_text) in chunks.into_iter().enumerate() {
            let vector = match embedder.embed(&chunk_text).await {
                Ok(vector) => vector,
                Err(e) => {
                    warn!(
                        document = %filename,
                        chunk = chunk_index,
                        "embedding failed, skipping chunk: {}",
                        e
                    );
                    stats.chunks_skipped += 1;
                    continue;
                }
            };

            let text_length = chunk_text.len();
            batch.push(Point {
                id: next_id,
                vector,
                payload: Payload::Chunk {
                    filename: filename.clone(),
                    chunk_index,
                    total_chunks,
                    text: chunk_text,
                    text_length,
                },
            });
            next_id += 1;
            stats.chunks_indexed += 1;

            if batch.len() >= config.store.batch_size {
                store.upsert(&batch).await?;
                batch.clear();
            }
        }

        stats.documents_indexed += 1;
    }

    store.upsert(&batch).await?;

    // Metadata record last: its presence marks the collection as
    // fully populated.
    store
        .upsert(&[Point {
            id: METADATA_POINT_ID,
            vector: vec![0.0; config.embedding.dims],
            payload: Payload::Metadata {
                corpus_hash: fingerprint,
                indexed_at: chrono::Utc::now().to_rfc3339(),
            },
        }])
        .await?;

    info!(
        documents = stats.documents_indexed,
        skipped = stats.documents_skipped,
        chunks = stats.chunks_indexed,
        "index rebuild complete"
    );

    Ok(stats)
}
