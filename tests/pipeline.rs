//! End-to-end ingestion and query pipeline tests against the durable store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use recall::chat_archive::ChatArchive;
use recall::config::{ChunkingConfig, StorageConfig};
use recall::ingest::{Ingestor, TextSource};
use recall::search::QueryEngine;
use recall::sqlite_store::SqliteVectorStore;
use recall_core::embedding::{EmbeddingProvider, HashEmbedder};
use recall_core::models::{ChatMessage, ChatTranscript, IngestRequest, Role, Vector};
use recall_core::store::{chat_of, VectorStore};
use recall_core::{Error, ErrorKind, Result};
use tempfile::TempDir;

const DIM: usize = 8;

/// Returns the same unit vector for every text; fails from call `fail_at`.
struct ScriptedProvider {
    calls: AtomicUsize,
    fail_at: Option<usize>,
    dims: usize,
}

impl ScriptedProvider {
    fn unit() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_at: None,
            dims: DIM,
        }
    }

    fn failing_at(call: usize) -> Self {
        Self {
            fail_at: Some(call),
            ..Self::unit()
        }
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedProvider {
    fn model_name(&self) -> &str {
        "scripted"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, _text: &str) -> Result<Vector> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_at.is_some_and(|f| n >= f) {
            return Err(Error::Provider("model unavailable".into()));
        }
        let mut v = vec![0.0; self.dims];
        v[0] = 1.0;
        Ok(v)
    }
}

struct Harness {
    _tmp: TempDir,
    store: Arc<SqliteVectorStore>,
    archive: Arc<ChatArchive>,
    ingestor: Ingestor,
    query: QueryEngine,
}

async fn harness(provider: Arc<dyn EmbeddingProvider>, target_size: i64, overlap: i64) -> Harness {
    let tmp = TempDir::new().unwrap();
    let storage = StorageConfig {
        path: tmp.path().to_path_buf(),
    };
    let store = Arc::new(SqliteVectorStore::open(&storage, DIM).await.unwrap());
    let archive = Arc::new(ChatArchive::new(tmp.path()));
    let chunking = ChunkingConfig {
        target_size,
        overlap,
    };
    let dyn_store: Arc<dyn VectorStore> = store.clone();
    let ingestor = Ingestor::new(dyn_store.clone(), archive.clone(), provider.clone(), &chunking);
    let query = QueryEngine::new(dyn_store, provider, 5);
    Harness {
        _tmp: tmp,
        store,
        archive,
        ingestor,
        query,
    }
}

fn source(name: &str) -> TextSource {
    TextSource {
        source: name.to_string(),
        title: name.to_string(),
        ..Default::default()
    }
}

const THREE_PARAGRAPHS: &str =
    "First paragraph here.\n\nSecond paragraph here.\n\nThird paragraph here.";

#[tokio::test]
async fn test_ingest_then_query_scores_one() {
    let h = harness(Arc::new(ScriptedProvider::unit()), 1000, 0).await;

    let report = h
        .ingestor
        .ingest_text(&source("ab.txt"), "Alpha.\n\nBeta.")
        .await
        .unwrap();
    assert_eq!(report.chunk_count(), 1);

    let results = h.query.query("anything", 1, None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, report.document_ids[0]);
    assert_eq!(results[0].content, "Alpha.\n\nBeta.");
    assert_eq!(results[0].source, "ab.txt");
    assert!((results[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_chunk_metadata_positions() {
    let h = harness(Arc::new(ScriptedProvider::unit()), 25, 0).await;

    let report = h
        .ingestor
        .ingest_text(&source("three.md"), THREE_PARAGRAPHS)
        .await
        .unwrap();
    assert_eq!(report.chunk_count(), 3);

    for (i, id) in report.document_ids.iter().enumerate() {
        let doc = h.store.get(id).await.unwrap();
        assert_eq!(doc.metadata.chunk_index, i);
        assert_eq!(doc.metadata.chunk_count, 3);
        assert_eq!(doc.metadata.source, "three.md");
    }
}

#[tokio::test]
async fn test_provider_failure_mid_ingest_reports_committed_ids() {
    let h = harness(Arc::new(ScriptedProvider::failing_at(1)), 25, 0).await;

    let err = h
        .ingestor
        .ingest_text(&source("three.md"), THREE_PARAGRAPHS)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PartialFailure);
    assert_eq!(err.committed_ids().len(), 1);
    match &err {
        Error::PartialFailure { total, source, .. } => {
            assert_eq!(*total, 3);
            assert_eq!(source.kind(), ErrorKind::Provider);
        }
        other => panic!("unexpected error: {}", other),
    }

    assert_eq!(h.store.count().await.unwrap(), 1);
    assert!(h.store.get(&err.committed_ids()[0]).await.is_ok());
}

#[tokio::test]
async fn test_provider_failure_on_first_fragment() {
    let h = harness(Arc::new(ScriptedProvider::failing_at(0)), 1000, 0).await;

    let err = h
        .ingestor
        .ingest_text(&source("a.txt"), "Alpha.")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);
    assert_eq!(h.store.count().await.unwrap(), 0);

    let err = h.query.query("Alpha", 1, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);
}

#[tokio::test]
async fn test_wrong_dimension_provider_is_provider_fault() {
    let provider = ScriptedProvider {
        dims: DIM + 1,
        ..ScriptedProvider::unit()
    };
    let h = harness(Arc::new(provider), 1000, 0).await;

    let err = h
        .ingestor
        .ingest_text(&source("a.txt"), "Alpha.")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);
    assert_eq!(h.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_text_and_empty_query() {
    let h = harness(Arc::new(ScriptedProvider::unit()), 1000, 0).await;

    let report = h.ingestor.ingest_text(&source("e"), "  \n\n ").await.unwrap();
    assert_eq!(report.chunk_count(), 0);
    assert!(h.query.query("anything", 5, None).await.unwrap().is_empty());

    let err = h.query.query("", 5, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

fn chat(id: &str, messages: &[(&str, &str)]) -> ChatTranscript {
    ChatTranscript {
        id: id.to_string(),
        title: String::new(),
        messages: messages
            .iter()
            .map(|(role, content)| ChatMessage {
                role: Role::from(role.to_string()),
                content: content.to_string(),
                timestamp: None,
            })
            .collect(),
    }
}

#[tokio::test]
async fn test_transcript_ingest_archives_and_indexes() {
    let h = harness(Arc::new(HashEmbedder::new(DIM)), 1000, 0).await;

    let outcome = h
        .ingestor
        .ingest_transcript("Aria", chat("", &[("user", "hi"), ("assistant", "hello traveler")]))
        .await
        .unwrap();

    assert!(!outcome.info.id.is_empty());
    assert!(outcome.info.title.starts_with("Aria chat "));
    assert_eq!(outcome.report.chunk_count(), 1);

    let archived = h.archive.get("Aria", &outcome.info.id).await.unwrap();
    assert_eq!(archived.messages.len(), 2);

    let doc = h.store.get(&outcome.report.document_ids[0]).await.unwrap();
    assert_eq!(doc.metadata.source, "character_chat");
    assert!(doc.metadata.has_tag("chat"));
    assert!(doc.metadata.has_tag("Aria"));
    assert_eq!(doc.metadata.custom["chat_id"], outcome.info.id);
    assert_eq!(doc.metadata.custom["message_count"], "2");
    assert!(doc.content.contains("User:\nhi"));
    assert!(doc.content.contains("Assistant:\nhello traveler"));
}

#[tokio::test]
async fn test_reingesting_chat_replaces_chunks() {
    let h = harness(Arc::new(HashEmbedder::new(DIM)), 1000, 0).await;

    h.ingestor
        .ingest_transcript("Aria", chat("c1", &[("user", "hi")]))
        .await
        .unwrap();
    let second = h
        .ingestor
        .ingest_transcript("Aria", chat("c1", &[("user", "hi"), ("assistant", "hello")]))
        .await
        .unwrap();

    assert_eq!(second.replaced, 1);
    assert_eq!(h.store.count().await.unwrap(), 1);
    assert_eq!(h.archive.list_chats("Aria").await.unwrap()[0].message_count, 2);
}

#[tokio::test]
async fn test_failed_reingest_keeps_earlier_chunks() {
    let h = harness(Arc::new(ScriptedProvider::failing_at(1)), 1000, 0).await;

    let first = h
        .ingestor
        .ingest_transcript("Aria", chat("c1", &[("user", "the dragon sleeps")]))
        .await
        .unwrap();
    assert_eq!(h.store.count().await.unwrap(), 1);

    let err = h
        .ingestor
        .ingest_transcript("Aria", chat("c1", &[("user", "the dragon wakes")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);

    assert_eq!(h.store.count().await.unwrap(), 1);
    let kept = h.store.get(&first.report.document_ids[0]).await.unwrap();
    assert!(kept.content.contains("the dragon sleeps"));

    let archived = h.archive.get("Aria", "c1").await.unwrap();
    assert_eq!(archived.messages[0].content, "the dragon wakes");
}

#[tokio::test]
async fn test_empty_transcript_rejected() {
    let h = harness(Arc::new(HashEmbedder::new(DIM)), 1000, 0).await;

    let err = h
        .ingestor
        .ingest_transcript("Aria", chat("c1", &[]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(h.archive.list_chats("Aria").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_forget_chat_removes_archive_and_chunks() {
    let h = harness(Arc::new(HashEmbedder::new(DIM)), 1000, 0).await;

    h.ingestor
        .ingest_transcript("Aria", chat("c1", &[("user", "the dragon sleeps")]))
        .await
        .unwrap();
    h.ingestor
        .ingest_transcript("Bram", chat("c1", &[("user", "the forge is hot")]))
        .await
        .unwrap();

    let removed = h.ingestor.forget_chat("Aria", "c1").await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(h.store.count().await.unwrap(), 1);
    assert_eq!(h.archive.get("Aria", "c1").await.unwrap_err().kind(), ErrorKind::NotFound);
    assert!(h.archive.get("Bram", "c1").await.is_ok());

    let err = h.ingestor.forget_chat("Aria", "c1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_query_scoped_to_character() {
    let h = harness(Arc::new(HashEmbedder::new(DIM)), 1000, 0).await;

    h.ingestor
        .ingest_transcript("Aria", chat("c1", &[("user", "dragons")]))
        .await
        .unwrap();
    h.ingestor
        .ingest_transcript("Bram", chat("c2", &[("user", "dragons")]))
        .await
        .unwrap();
    h.ingestor
        .ingest_text(&source("lore.md"), "dragons")
        .await
        .unwrap();

    let filter = chat_of("Bram");
    let results = h.query.query("dragons", 10, Some(&filter)).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source, "character_chat");
    assert!(results[0].content.contains("dragons"));

    let all = h.query.query("dragons", 10, None).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_databank_ingest() {
    let h = harness(Arc::new(HashEmbedder::new(DIM)), 1000, 0).await;

    let request = IngestRequest {
        name: "Bestiary".into(),
        content: "Wyverns nest on cliffs.".into(),
        kind: "note".into(),
        tags: vec!["lore".into()],
    };
    let report = h.ingestor.ingest_databank(&request).await.unwrap();
    let doc = h.store.get(&report.document_ids[0]).await.unwrap();
    assert_eq!(doc.metadata.source, "note");
    assert_eq!(doc.metadata.title, "Bestiary");
    for tag in ["databank", "note", "lore"] {
        assert!(doc.metadata.has_tag(tag), "missing tag {}", tag);
    }

    let empty = IngestRequest {
        content: "   ".into(),
        ..request
    };
    let err = h.ingestor.ingest_databank(&empty).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_file_ingest_metadata() {
    let h = harness(Arc::new(HashEmbedder::new(DIM)), 1000, 0).await;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dragons.md");
    std::fs::write(&path, "# Dragons\n\nThey sleep on gold.").unwrap();

    let report = h
        .ingestor
        .ingest_file(&path, &["lore".to_string()])
        .await
        .unwrap();
    let doc = h.store.get(&report.document_ids[0]).await.unwrap();
    assert_eq!(doc.metadata.source, "dragons.md");
    assert_eq!(doc.metadata.title, "dragons");
    assert!(doc.metadata.has_tag("md"));
    assert!(doc.metadata.has_tag("lore"));
    assert!(doc.metadata.custom.contains_key("upload_time"));

    let bad = dir.path().join("sheet.xlsx");
    std::fs::write(&bad, "x").unwrap();
    let err = h.ingestor.ingest_file(&bad, &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}
