//! Durable [`VectorStore`] backed by SQLite and flat vector files.
//!
//! Document records are JSON values in the `kv` table under `doc:<id>`,
//! giving atomic per-document writes and an ordered prefix scan. Vectors
//! live outside the database in `<vectors_dir>/<id>.vec`, exactly
//! `dimension × 4` bytes of little-endian `f32`s, so other tooling can read
//! them directly.
//!
//! # Locking
//!
//! Every operation holds a `tokio::sync::RwLock`: reads share it, `add` and
//! `delete` take it exclusively. A search therefore never sees a document
//! without its vector or vice versa. After [`close`](SqliteVectorStore::close)
//! every operation fails with a storage error.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use recall_core::embedding::{bytes_to_vec, vec_to_bytes};
use recall_core::models::{Document, Vector};
use recall_core::search::{rank, SearchHit};
use recall_core::store::{DocumentFilter, VectorStore};
use recall_core::{Error, Result};

use crate::config::StorageConfig;
use crate::db;
use crate::migrate;

const DOC_PREFIX: &str = "doc:";
// First key after every `doc:` key (';' follows ':' in ASCII).
const DOC_PREFIX_END: &str = "doc;";

#[derive(Debug, Default)]
struct State {
    closed: bool,
}

/// SQLite + vector-file implementation of the [`VectorStore`] trait.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    vectors_dir: PathBuf,
    dimension: usize,
    state: RwLock<State>,
}

impl SqliteVectorStore {
    /// Open (creating if needed) the store under `storage.path`.
    pub async fn open(storage: &StorageConfig, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::InvalidInput(
                "vector dimension must be greater than zero".into(),
            ));
        }
        let vectors_dir = storage.vectors_dir();
        tokio::fs::create_dir_all(&vectors_dir)
            .await
            .map_err(|e| Error::storage(&format!("create {}", vectors_dir.display()), e))?;

        let pool = db::connect(&storage.db_path()).await?;
        migrate::run_migrations(&pool).await?;

        info!(path = %storage.path.display(), dimension, "vector store opened");
        Ok(Self {
            pool,
            vectors_dir,
            dimension,
            state: RwLock::new(State::default()),
        })
    }

    /// Close the database pool. Later operations fail cleanly.
    pub async fn close(&self) {
        let mut state = self.state.write().await;
        if state.closed {
            return;
        }
        state.closed = true;
        self.pool.close().await;
        info!("vector store closed");
    }

    /// Path of the vector file for `id`.
    pub fn vector_path(&self, id: &str) -> PathBuf {
        self.vectors_dir.join(format!("{}.vec", id))
    }

    async fn load_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query("SELECT key, value FROM kv WHERE key >= ? AND key < ? ORDER BY seq")
            .bind(DOC_PREFIX)
            .bind(DOC_PREFIX_END)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::storage("scan documents", e))?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.get("key");
            let value: String = row.get("value");
            match serde_json::from_str::<Document>(&value) {
                Ok(doc) => docs.push(doc),
                Err(e) => warn!(key = %key, error = %e, "skipping unreadable document record"),
            }
        }
        Ok(docs)
    }

    async fn read_vector(&self, id: &str) -> Result<Vector> {
        let path = self.vector_path(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(Error::NotFound(format!("vector {}", id)))
            }
            Err(e) => return Err(Error::storage(&format!("read {}", path.display()), e)),
        };
        if bytes.len() != self.dimension * 4 {
            return Err(Error::Storage(format!(
                "vector file {} has {} bytes, expected {}",
                path.display(),
                bytes.len(),
                self.dimension * 4
            )));
        }
        bytes_to_vec(&bytes)
            .ok_or_else(|| Error::Storage(format!("vector file {} is malformed", path.display())))
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::storage("begin transaction", e))?;
        let result = sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(doc_key(id))
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::storage("delete document", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("document {}", id)));
        }
        tx.commit()
            .await
            .map_err(|e| Error::storage("commit delete", e))?;

        let path = self.vector_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                warn!(id, "vector file already missing on delete")
            }
            Err(e) => return Err(Error::storage(&format!("remove {}", path.display()), e)),
        }
        debug!(id, "document deleted");
        Ok(())
    }
}

/// Best-effort removal of a file left behind by a failed or finished write.
async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == IoErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove leftover vector file"),
    }
}

fn doc_key(id: &str) -> String {
    format!("{}{}", DOC_PREFIX, id)
}

fn ensure_open(state: &State) -> Result<()> {
    if state.closed {
        return Err(Error::Storage("store is closed".into()));
    }
    Ok(())
}

/// Ids become file names, so they must not contain path syntax.
fn validate_id(id: &str) -> Result<()> {
    if id.is_empty()
        || id.starts_with('.')
        || id.contains(['/', '\\', '\0'])
    {
        return Err(Error::InvalidInput(format!("invalid document id: {:?}", id)));
    }
    Ok(())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn add(&self, document: &Document, vector: &[f32]) -> Result<()> {
        validate_id(&document.id)?;
        if vector.len() != self.dimension {
            return Err(Error::InvalidInput(format!(
                "vector has {} dimensions, store expects {}",
                vector.len(),
                self.dimension
            )));
        }
        let value = serde_json::to_string(document)?;

        let state = self.state.write().await;
        ensure_open(&state)?;

        let path = self.vector_path(&document.id);
        let tmp = path.with_extension("vec.tmp");
        let backup = path.with_extension("vec.bak");

        tokio::fs::write(&tmp, vec_to_bytes(vector))
            .await
            .map_err(|e| Error::storage(&format!("write {}", tmp.display()), e))?;

        // An overwritten vector is parked until the row commits.
        let existed = match tokio::fs::rename(&path, &backup).await {
            Ok(()) => true,
            Err(e) if e.kind() == IoErrorKind::NotFound => false,
            Err(e) => {
                discard(&tmp).await;
                return Err(Error::storage(&format!("move {}", path.display()), e));
            }
        };

        let outcome = async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| Error::storage("begin transaction", e))?;
            sqlx::query(
                "INSERT INTO kv (key, value) VALUES (?, ?) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(doc_key(&document.id))
            .bind(&value)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::storage("write document", e))?;

            tokio::fs::rename(&tmp, &path)
                .await
                .map_err(|e| Error::storage(&format!("write {}", path.display()), e))?;

            if let Err(e) = tx.commit().await {
                discard(&path).await;
                return Err(Error::storage("commit document", e));
            }
            Ok::<(), Error>(())
        }
        .await;

        match &outcome {
            Ok(()) => {
                if existed {
                    discard(&backup).await;
                }
                debug!(id = %document.id, overwrite = existed, "document stored");
            }
            Err(_) => {
                discard(&tmp).await;
                if existed {
                    if let Err(e) = tokio::fs::rename(&backup, &path).await {
                        warn!(id = %document.id, error = %e, "failed to restore previous vector");
                    }
                }
            }
        }
        outcome
    }

    async fn get(&self, id: &str) -> Result<Document> {
        let state = self.state.read().await;
        ensure_open(&state)?;

        let row = sqlx::query("SELECT value FROM kv WHERE key = ?")
            .bind(doc_key(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::storage("read document", e))?;
        let row = row.ok_or_else(|| Error::NotFound(format!("document {}", id)))?;
        let value: String = row.get("value");
        Ok(serde_json::from_str(&value)?)
    }

    async fn get_vector(&self, id: &str) -> Result<Vector> {
        validate_id(id)?;
        let state = self.state.read().await;
        ensure_open(&state)?;
        self.read_vector(id).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let state = self.state.write().await;
        ensure_open(&state)?;
        self.remove(id).await
    }

    async fn list(&self) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        ensure_open(&state)?;
        self.load_documents().await
    }

    async fn search(
        &self,
        query: &[f32],
        limit: i64,
        filter: Option<&dyn DocumentFilter>,
    ) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(Error::InvalidInput(format!(
                "query vector has {} dimensions, store expects {}",
                query.len(),
                self.dimension
            )));
        }
        let state = self.state.read().await;
        ensure_open(&state)?;

        let docs = self.load_documents().await?;
        let mut candidates = Vec::with_capacity(docs.len());
        for doc in docs {
            if let Some(f) = filter {
                if !f.matches(&doc) {
                    continue;
                }
            }
            match self.read_vector(&doc.id).await {
                Ok(v) => candidates.push((doc, v)),
                Err(e) => warn!(id = %doc.id, error = %e, "skipping document without readable vector"),
            }
        }
        Ok(rank(query, candidates, limit))
    }

    async fn delete_where(&self, filter: &dyn DocumentFilter) -> Result<Vec<String>> {
        let state = self.state.write().await;
        ensure_open(&state)?;

        let ids: Vec<String> = self
            .load_documents()
            .await?
            .into_iter()
            .filter(|d| filter.matches(d))
            .map(|d| d.id)
            .collect();
        for id in &ids {
            self.remove(id).await?;
        }
        if !ids.is_empty() {
            info!(count = ids.len(), "bulk delete");
        }
        Ok(ids)
    }

    async fn count(&self) -> Result<usize> {
        let state = self.state.read().await;
        ensure_open(&state)?;
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv WHERE key >= ? AND key < ?")
            .bind(DOC_PREFIX)
            .bind(DOC_PREFIX_END)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::storage("count documents", e))?;
        Ok(n as usize)
    }
}
