//! End-to-end pipeline tests over the in-memory store with stubbed
//! embedding and generation backends.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tempfile::TempDir;

use docqa::config::Config;
use docqa::context::{ChatTurn, TurnRole, NOT_FOUND_ANSWER, UNAVAILABLE_ANSWER};
use docqa::embedding::Embedder;
use docqa::engine::Engine;
use docqa::extract::extract_file;
use docqa::fingerprint::EMPTY_CORPUS;
use docqa::generate::{GenerationError, Generator};
use docqa::index::{self, IndexOutcome};
use docqa::store::memory::InMemoryStore;
use docqa::store::{Payload, VectorStore, METADATA_POINT_ID};

/// Keyword vocabulary for the stub embedder. One dimension per keyword
/// makes similarity fully predictable: texts sharing keywords score
/// high, texts with disjoint keywords score zero.
const FEATURES: [&str; 8] = [
    "reset", "router", "ship", "tracking", "warranty", "return", "step", "email",
];

fn feature_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    FEATURES
        .iter()
        .map(|word| lower.matches(word).count() as f32)
        .collect()
}

/// Deterministic embedder that counts calls and optionally fails on
/// texts containing a marker.
struct StubEmbedder {
    calls: AtomicUsize,
    fail_marker: Option<String>,
}

impl StubEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_marker: None,
        }
    }

    fn failing_on(marker: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_marker: Some(marker.to_string()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker) {
                bail!("injected embedding failure");
            }
        }
        Ok(feature_vector(text))
    }

    fn dims(&self) -> usize {
        FEATURES.len()
    }
}

/// Canned generator: echoes the prompt back, or fails with a fixed
/// error kind.
enum StubGenerator {
    Echo,
    Quota,
    Timeout,
}

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(
        &self,
        _system_instruction: &str,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        match self {
            StubGenerator::Echo => Ok(prompt.to_string()),
            StubGenerator::Quota => Err(GenerationError::Quota),
            StubGenerator::Timeout => Err(GenerationError::Timeout),
        }
    }
}

fn test_config(corpus: &Path) -> Config {
    let mut config = Config::default();
    config.corpus.path = corpus.to_path_buf();
    config.corpus.extension = "txt".to_string();
    config.embedding.dims = FEATURES.len();
    config
}

fn build_engine(
    corpus: &Path,
    store: Arc<InMemoryStore>,
    embedder: Arc<StubEmbedder>,
    generator: StubGenerator,
) -> Engine {
    Engine::new(
        test_config(corpus),
        store,
        embedder,
        Arc::new(generator),
    )
}

fn write_corpus(dir: &TempDir, files: &[(&str, &str)]) {
    for (name, content) in files {
        std::fs::write(dir.path().join(name), content).unwrap();
    }
}

/// Minimal valid single-page PDF containing `text`. Builds the body and
/// then the xref table with correct byte offsets, and computes the
/// content stream `/Length`, so `pdf-extract` can parse it and recover
/// the text. `text` must not contain parentheses or backslashes.
fn minimal_pdf(text: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 72 712 Td ({}) Tj ET", text);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            stream.len(),
            stream
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

const FAQ_TEXT: &str =
    "To reset the router: Step 1. Unplug the power cable. Step 2. Wait ten seconds.";
const SHIPPING_TEXT: &str =
    "Orders ship within two business days. A tracking number arrives by email.";

#[tokio::test]
async fn test_rebuild_then_up_to_date() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir, &[("faq.txt", FAQ_TEXT), ("shipping.txt", SHIPPING_TEXT)]);

    let embedder = Arc::new(StubEmbedder::new());
    let engine = build_engine(
        dir.path(),
        Arc::new(InMemoryStore::new()),
        embedder.clone(),
        StubGenerator::Echo,
    );

    match engine.ensure_indexed(false).await.unwrap() {
        IndexOutcome::Rebuilt(stats) => {
            assert_eq!(stats.documents_indexed, 2);
            assert_eq!(stats.documents_skipped, 0);
            assert!(stats.chunks_indexed >= 2);
        }
        other => panic!("expected rebuild, got {:?}", other),
    }
    let calls_after_first = embedder.calls();
    assert!(calls_after_first >= 2);

    // Unchanged corpus: nothing re-embedded.
    assert!(matches!(
        engine.ensure_indexed(false).await.unwrap(),
        IndexOutcome::UpToDate
    ));
    assert_eq!(embedder.calls(), calls_after_first);
}

#[tokio::test]
async fn test_retrieval_ranks_relevant_document_first() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir, &[("faq.txt", FAQ_TEXT), ("shipping.txt", SHIPPING_TEXT)]);

    let engine = build_engine(
        dir.path(),
        Arc::new(InMemoryStore::new()),
        Arc::new(StubEmbedder::new()),
        StubGenerator::Echo,
    );
    engine.ensure_indexed(false).await.unwrap();

    let hits = engine.retrieve("How do I reset the router?").await;
    assert!(!hits.is_empty());
    assert_eq!(hits[0].filename, "faq.txt");
    assert_eq!(hits[0].chunk_index, 0);
    assert!(hits[0].score > 0.0);
}

#[tokio::test]
async fn test_empty_corpus_indexes_metadata_only() {
    let dir = TempDir::new().unwrap();

    let store = Arc::new(InMemoryStore::new());
    let engine = build_engine(
        dir.path(),
        store.clone(),
        Arc::new(StubEmbedder::new()),
        StubGenerator::Echo,
    );

    match engine.ensure_indexed(false).await.unwrap() {
        IndexOutcome::Rebuilt(stats) => {
            assert_eq!(stats.documents_indexed, 0);
            assert_eq!(stats.chunks_indexed, 0);
            assert_eq!(stats.fingerprint, EMPTY_CORPUS);
        }
        other => panic!("expected rebuild, got {:?}", other),
    }

    assert!(store.collection_exists().await.unwrap());
    assert_eq!(store.count().await.unwrap(), 0);

    let meta = store.retrieve(&[METADATA_POINT_ID]).await.unwrap();
    assert_eq!(meta.len(), 1);
    match &meta[0].payload {
        Payload::Metadata { corpus_hash, .. } => assert_eq!(corpus_hash, EMPTY_CORPUS),
        other => panic!("unexpected payload: {:?}", other),
    }

    assert!(engine.retrieve("anything").await.is_empty());

    // Still-empty corpus matches the sentinel on the next run.
    assert!(matches!(
        engine.ensure_indexed(false).await.unwrap(),
        IndexOutcome::UpToDate
    ));
}

#[tokio::test]
async fn test_partial_embedding_failure_completes_run() {
    let dir = TempDir::new().unwrap();
    // Paragraphs small enough that each becomes its own chunk at
    // chunk_size 60.
    let doc = "The warranty covers parts for two years.\n\n\
               Returns are accepted within thirty days.\n\n\
               FAILME this paragraph cannot be embedded.\n\n\
               Contact support by email for anything else.";
    write_corpus(&dir, &[("policies.txt", doc)]);

    let store = Arc::new(InMemoryStore::new());
    let embedder = Arc::new(StubEmbedder::failing_on("FAILME"));
    let mut config = test_config(dir.path());
    config.chunking.chunk_size = 60;
    config.chunking.overlap = 10;
    let engine = Engine::new(
        config,
        store.clone(),
        embedder,
        Arc::new(StubGenerator::Echo),
    );

    let stats = match engine.ensure_indexed(false).await.unwrap() {
        IndexOutcome::Rebuilt(stats) => stats,
        other => panic!("expected rebuild, got {:?}", other),
    };

    assert_eq!(stats.documents_indexed, 1);
    assert_eq!(stats.chunks_skipped, 1);
    assert_eq!(stats.chunks_indexed, 3);
    assert_eq!(store.count().await.unwrap(), 3);

    // Ids stay contiguous from 1 despite the skipped chunk, and the
    // fingerprint is recorded so the run counts as complete.
    let points = store.retrieve(&[1, 2, 3, 4]).await.unwrap();
    assert_eq!(points.len(), 3);
    let status = engine.status().await.unwrap();
    assert!(status.up_to_date());
}

#[tokio::test]
async fn test_corpus_change_triggers_rebuild() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir, &[("faq.txt", FAQ_TEXT)]);

    let embedder = Arc::new(StubEmbedder::new());
    let engine = build_engine(
        dir.path(),
        Arc::new(InMemoryStore::new()),
        embedder.clone(),
        StubGenerator::Echo,
    );
    engine.ensure_indexed(false).await.unwrap();
    let calls_before = embedder.calls();

    std::fs::write(
        dir.path().join("faq.txt"),
        format!("{}\n\nStep 3. Plug it back in.", FAQ_TEXT),
    )
    .unwrap();

    assert!(matches!(
        engine.ensure_indexed(false).await.unwrap(),
        IndexOutcome::Rebuilt(_)
    ));
    assert!(embedder.calls() > calls_before);
}

#[tokio::test]
async fn test_force_rebuilds_unchanged_corpus() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir, &[("faq.txt", FAQ_TEXT)]);

    let engine = build_engine(
        dir.path(),
        Arc::new(InMemoryStore::new()),
        Arc::new(StubEmbedder::new()),
        StubGenerator::Echo,
    );
    engine.ensure_indexed(false).await.unwrap();

    assert!(matches!(
        engine.ensure_indexed(true).await.unwrap(),
        IndexOutcome::Rebuilt(_)
    ));
}

#[tokio::test]
async fn test_point_ids_contiguous_from_one() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir, &[("faq.txt", FAQ_TEXT), ("shipping.txt", SHIPPING_TEXT)]);

    let store = Arc::new(InMemoryStore::new());
    let engine = build_engine(
        dir.path(),
        store.clone(),
        Arc::new(StubEmbedder::new()),
        StubGenerator::Echo,
    );
    engine.ensure_indexed(false).await.unwrap();

    let n = store.count().await.unwrap();
    assert!(n >= 2);

    let ids: Vec<u64> = (0..=n).collect();
    let points = store.retrieve(&ids).await.unwrap();
    assert_eq!(points.len() as u64, n + 1);
    assert!(matches!(points[0].payload, Payload::Metadata { .. }));
    for point in &points[1..] {
        assert!(matches!(point.payload, Payload::Chunk { .. }));
    }
    assert!(store.retrieve(&[n + 1]).await.unwrap().is_empty());
}

#[test]
fn test_pdf_extraction_recovers_text() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("faq.pdf");
    std::fs::write(
        &path,
        minimal_pdf("To reset the router unplug the power cable"),
    )
    .unwrap();

    let text = extract_file(&path).unwrap();
    assert!(
        text.contains("reset the router"),
        "extracted text: {:?}",
        text
    );
}

#[tokio::test]
async fn test_pdf_corpus_indexed_and_retrieved() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("faq.pdf"),
        minimal_pdf("To reset the router unplug the power cable then wait ten seconds"),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("shipping.pdf"),
        minimal_pdf("Orders ship within two business days and a tracking number arrives by email"),
    )
    .unwrap();

    // Default extension "pdf": the whole pipeline runs through
    // pdf-extract, not the plain-text passthrough.
    let mut config = Config::default();
    config.corpus.path = dir.path().to_path_buf();
    config.embedding.dims = FEATURES.len();

    let store = Arc::new(InMemoryStore::new());
    let engine = Engine::new(
        config,
        store.clone(),
        Arc::new(StubEmbedder::new()),
        Arc::new(StubGenerator::Echo),
    );

    match engine.ensure_indexed(false).await.unwrap() {
        IndexOutcome::Rebuilt(stats) => {
            assert_eq!(stats.documents_indexed, 2);
            assert_eq!(stats.documents_skipped, 0);
        }
        other => panic!("expected rebuild, got {:?}", other),
    }

    let hits = engine.retrieve("How do I reset the router?").await;
    assert!(!hits.is_empty());
    assert_eq!(hits[0].filename, "faq.pdf");
    assert!(hits[0].score > 0.0);
}

#[tokio::test]
async fn test_rename_triggers_rebuild() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir, &[("faq.txt", FAQ_TEXT)]);

    let embedder = Arc::new(StubEmbedder::new());
    let engine = build_engine(
        dir.path(),
        Arc::new(InMemoryStore::new()),
        embedder.clone(),
        StubGenerator::Echo,
    );
    engine.ensure_indexed(false).await.unwrap();

    std::fs::rename(dir.path().join("faq.txt"), dir.path().join("warranty.txt")).unwrap();

    assert!(matches!(
        engine.ensure_indexed(false).await.unwrap(),
        IndexOutcome::Rebuilt(_)
    ));
    let hits = engine.retrieve("How do I reset the router?").await;
    assert_eq!(hits[0].filename, "warranty.txt");
}

#[tokio::test]
async fn test_status_needs_only_the_store() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir, &[("faq.txt", FAQ_TEXT)]);
    let config = test_config(dir.path());
    let store = Arc::new(InMemoryStore::new());

    // No embedder or generator in sight.
    let fresh = index::status(store.as_ref(), &config).await.unwrap();
    assert!(!fresh.collection_exists);
    assert!(!fresh.up_to_date());

    let embedder = StubEmbedder::new();
    index::ensure_indexed(store.as_ref(), &embedder, &config, false)
        .await
        .unwrap();

    let indexed = index::status(store.as_ref(), &config).await.unwrap();
    assert!(indexed.collection_exists);
    assert_eq!(indexed.content_points, 1);
    assert!(indexed.up_to_date());
    assert!(indexed.indexed_at.is_some());
}

#[tokio::test]
async fn test_answer_prompt_carries_context_and_history() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir, &[("faq.txt", FAQ_TEXT)]);

    let engine = build_engine(
        dir.path(),
        Arc::new(InMemoryStore::new()),
        Arc::new(StubEmbedder::new()),
        StubGenerator::Echo,
    );
    engine.ensure_indexed(false).await.unwrap();

    let turns = vec![ChatTurn {
        role: TurnRole::User,
        text: "Is the router covered by warranty?".to_string(),
    }];
    let answer = engine.answer("How do I reset the router?", &turns).await;

    // Echo generator returns the assembled prompt.
    assert!(answer.contains("[Source: faq.txt]"));
    assert!(answer.contains("Step 1. Unplug the power cable."));
    assert!(answer.contains("User: Is the router covered by warranty?"));
    assert!(answer.ends_with("Question: How do I reset the router?"));
}

#[tokio::test]
async fn test_answer_falls_back_when_nothing_retrieved() {
    let dir = TempDir::new().unwrap();

    let engine = build_engine(
        dir.path(),
        Arc::new(InMemoryStore::new()),
        Arc::new(StubEmbedder::new()),
        StubGenerator::Echo,
    );
    engine.ensure_indexed(false).await.unwrap();

    let answer = engine.answer("How do I reset the router?", &[]).await;
    assert_eq!(answer, NOT_FOUND_ANSWER);
}

#[tokio::test]
async fn test_answer_reports_unavailable_on_quota_and_timeout() {
    for generator in [StubGenerator::Quota, StubGenerator::Timeout] {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir, &[("faq.txt", FAQ_TEXT)]);

        let engine = build_engine(
            dir.path(),
            Arc::new(InMemoryStore::new()),
            Arc::new(StubEmbedder::new()),
            generator,
        );
        engine.ensure_indexed(false).await.unwrap();

        let answer = engine.answer("How do I reset the router?", &[]).await;
        assert_eq!(answer, UNAVAILABLE_ANSWER);
    }
}
