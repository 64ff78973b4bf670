//! Ingestion pipeline: text or transcript → chunks → embeddings → store.
//!
//! Every fragment gets a fresh id, is embedded, and is added to the store
//! in order. A failure on fragment *k* stops the remaining fragments; the
//! ids already committed are reported through
//! [`Error::PartialFailure`](recall_core::Error::PartialFailure).
//! Transcripts are archived verbatim before any embedding happens.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use recall_core::chat::{self, CHAT_SOURCE};
use recall_core::chunk::chunk_text;
use recall_core::embedding::{embed_checked, EmbeddingProvider};
use recall_core::models::{ChatInfo, ChatTranscript, Document, IngestRequest, Metadata};
use recall_core::store::{chat_id, VectorStore};
use recall_core::{Error, ErrorKind, Result};

use crate::app::Services;
use crate::chat_archive::ChatArchive;
use crate::config::ChunkingConfig;
use crate::extract;

/// Metadata shared by every fragment of one ingested text.
#[derive(Debug, Clone, Default)]
pub struct TextSource {
    pub source: String,
    pub title: String,
    pub tags: BTreeSet<String>,
    pub custom: BTreeMap<String, String>,
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Stored document ids, in fragment order.
    pub document_ids: Vec<String>,
}

impl IngestReport {
    pub fn chunk_count(&self) -> usize {
        self.document_ids.len()
    }
}

/// Outcome of ingesting a chat transcript.
#[derive(Debug, Clone)]
pub struct TranscriptReport {
    pub info: ChatInfo,
    /// Chunks of an earlier version of the same chat that were replaced.
    pub replaced: usize,
    pub report: IngestReport,
}

pub struct Ingestor {
    store: Arc<dyn VectorStore>,
    archive: Arc<ChatArchive>,
    provider: Arc<dyn EmbeddingProvider>,
    target_size: i64,
    overlap: i64,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn VectorStore>,
        archive: Arc<ChatArchive>,
        provider: Arc<dyn EmbeddingProvider>,
        chunking: &ChunkingConfig,
    ) -> Self {
        Self {
            store,
            archive,
            provider,
            target_size: chunking.target_size,
            overlap: chunking.overlap,
        }
    }

    /// Chunk, embed, and store `content` under `source`'s metadata.
    ///
    /// Empty input produces an empty report.
    pub async fn ingest_text(&self, source: &TextSource, content: &str) -> Result<IngestReport> {
        let fragments = chunk_text(content, self.target_size, self.overlap);
        let total = fragments.len();
        let dims = self.store.dimension();
        let mut committed = Vec::with_capacity(total);

        for (index, fragment) in fragments.into_iter().enumerate() {
            let document = Document {
                id: Uuid::new_v4().to_string(),
                content: fragment,
                metadata: Metadata {
                    source: source.source.clone(),
                    title: source.title.clone(),
                    tags: source.tags.clone(),
                    custom: source.custom.clone(),
                    chunk_index: index,
                    chunk_count: total,
                },
            };

            let stored = async {
                let vector = embed_checked(self.provider.as_ref(), &document.content, dims).await?;
                self.store.add(&document, &vector).await
            }
            .await;

            if let Err(e) = stored {
                warn!(
                    source = %source.source,
                    fragment = index,
                    total,
                    error = %e,
                    "ingestion stopped"
                );
                if committed.is_empty() {
                    return Err(e);
                }
                return Err(Error::PartialFailure {
                    committed,
                    total,
                    source: Box::new(e),
                });
            }
            debug!(id = %document.id, index, total, "fragment stored");
            committed.push(document.id);
        }

        info!(source = %source.source, title = %source.title, chunks = total, "ingested text");
        Ok(IngestReport {
            document_ids: committed,
        })
    }

    /// Ingest a file from disk, dispatching on its extension.
    pub async fn ingest_file(&self, path: &Path, extra_tags: &[String]) -> Result<IngestReport> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidInput(format!("not a file path: {}", path.display())))?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::InvalidInput(format!("cannot read {}: {}", path.display(), e)))?;
        let text = extract::extract_text(&bytes, &ext)
            .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))?;
        if text.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "{} contains no text",
                path.display()
            )));
        }

        let mut tags: BTreeSet<String> = extra_tags.iter().cloned().collect();
        tags.insert(ext);
        let mut custom = BTreeMap::new();
        custom.insert("upload_time".to_string(), Utc::now().to_rfc3339());

        let source = TextSource {
            source: file_name.to_string(),
            title: stem.to_string(),
            tags,
            custom,
        };
        self.ingest_text(&source, &text).await
    }

    /// Ingest a `{name, content, type}` DataBank payload.
    pub async fn ingest_databank(&self, request: &IngestRequest) -> Result<IngestReport> {
        if request.content.trim().is_empty() {
            return Err(Error::InvalidInput("databank content is empty".into()));
        }
        if request.name.trim().is_empty() {
            return Err(Error::InvalidInput("databank name is empty".into()));
        }

        let kind = if request.kind.is_empty() {
            "document".to_string()
        } else {
            request.kind.clone()
        };
        let mut tags: BTreeSet<String> = request.tags.iter().cloned().collect();
        tags.insert("databank".to_string());
        tags.insert(kind.clone());
        let mut custom = BTreeMap::new();
        custom.insert("upload_time".to_string(), Utc::now().to_rfc3339());

        let source = TextSource {
            source: kind,
            title: request.name.clone(),
            tags,
            custom,
        };
        self.ingest_text(&source, &request.content).await
    }

    /// Archive a transcript, then index it for retrieval.
    ///
    /// A missing id gets a UUID and a missing title a timestamped default.
    /// Chunks from an earlier ingestion of the same chat are replaced once
    /// the new version is stored; if ingestion fails they are kept.
    pub async fn ingest_transcript(
        &self,
        character: &str,
        mut transcript: ChatTranscript,
    ) -> Result<TranscriptReport> {
        if transcript.messages.is_empty() {
            return Err(Error::InvalidInput("transcript has no messages".into()));
        }
        let now = Utc::now();
        if transcript.id.trim().is_empty() {
            transcript.id = Uuid::new_v4().to_string();
        }
        if transcript.title.trim().is_empty() {
            transcript.title = chat::default_title(character, now);
        }

        let info = self.archive.save(character, &transcript).await?;

        let filter = chat_id(character, &transcript.id);
        let previous: Vec<String> = self
            .store
            .list_where(&filter)
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();

        let mut tags = BTreeSet::new();
        tags.insert("chat".to_string());
        tags.insert("character".to_string());
        tags.insert(character.to_string());

        let source = TextSource {
            source: CHAT_SOURCE.to_string(),
            title: transcript.title.clone(),
            tags,
            custom: chat::chat_metadata(&transcript, character, now),
        };
        // Earlier chunks stay searchable until the new version is fully stored.
        let report = self
            .ingest_text(&source, &chat::render_transcript(&transcript))
            .await?;

        let mut replaced = 0;
        for id in &previous {
            match self.store.delete(id).await {
                Ok(()) => replaced += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        if replaced > 0 {
            debug!(character, chat_id = %transcript.id, replaced, "replaced earlier chat chunks");
        }

        Ok(TranscriptReport {
            info,
            replaced,
            report,
        })
    }

    /// Remove a chat from the archive and all of its chunks from the store.
    ///
    /// Returns the number of chunks removed.
    pub async fn forget_chat(&self, character: &str, id: &str) -> Result<usize> {
        self.archive.delete(character, id).await?;
        let removed = self.store.delete_where(&chat_id(character, id)).await?;
        info!(character, chat_id = id, chunks = removed.len(), "chat forgotten");
        Ok(removed.len())
    }
}

// ============ CLI runners ============

pub async fn run_ingest_file(
    services: &Services,
    path: &Path,
    tags: &[String],
) -> anyhow::Result<()> {
    let report = services.ingestor.ingest_file(path, tags).await?;
    println!("ingest {}", path.display());
    println!("  chunks written: {}", report.chunk_count());
    Ok(())
}

pub async fn run_databank(
    services: &Services,
    name: &str,
    kind: &str,
    file: &Path,
) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let request = IngestRequest {
        name: name.to_string(),
        content,
        kind: kind.to_string(),
        tags: Vec::new(),
    };
    let report = services.ingestor.ingest_databank(&request).await?;
    println!("databank {} ({})", name, kind);
    println!("  chunks written: {}", report.chunk_count());
    Ok(())
}
