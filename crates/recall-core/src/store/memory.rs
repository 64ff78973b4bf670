//! In-memory [`VectorStore`] implementation for tests and embedding.
//!
//! Uses a `HashMap` behind `std::sync::RwLock` for thread safety. A
//! monotonic sequence number records insertion order for listing and
//! tie-breaking. Search is brute-force cosine similarity.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{Document, Vector};
use crate::search::{rank, SearchHit};

use super::{DocumentFilter, VectorStore};

struct StoredDoc {
    seq: u64,
    doc: Document,
    vector: Vector,
}

#[derive(Default)]
struct Inner {
    docs: HashMap<String, StoredDoc>,
    next_seq: u64,
}

impl Inner {
    fn ordered(&self) -> Vec<&StoredDoc> {
        let mut all: Vec<&StoredDoc> = self.docs.values().collect();
        all.sort_by_key(|s| s.seq);
        all
    }
}

/// In-memory store for testing.
pub struct InMemoryStore {
    dimension: usize,
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| Error::Storage("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| Error::Storage("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn add(&self, document: &Document, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::InvalidInput(format!(
                "vector has {} dimensions, store expects {}",
                vector.len(),
                self.dimension
            )));
        }
        let mut inner = self.write()?;
        let seq = match inner.docs.get(&document.id) {
            Some(existing) => existing.seq,
            None => {
                inner.next_seq += 1;
                inner.next_seq
            }
        };
        inner.docs.insert(
            document.id.clone(),
            StoredDoc {
                seq,
                doc: document.clone(),
                vector: vector.to_vec(),
            },
        );
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Document> {
        let inner = self.read()?;
        inner
            .docs
            .get(id)
            .map(|s| s.doc.clone())
            .ok_or_else(|| Error::NotFound(format!("document {}", id)))
    }

    async fn get_vector(&self, id: &str) -> Result<Vector> {
        let inner = self.read()?;
        inner
            .docs
            .get(id)
            .map(|s| s.vector.clone())
            .ok_or_else(|| Error::NotFound(format!("vector {}", id)))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut inner = self.write()?;
        match inner.docs.remove(id) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("document {}", id))),
        }
    }

    async fn list(&self) -> Result<Vec<Document>> {
        let inner = self.read()?;
        Ok(inner.ordered().into_iter().map(|s| s.doc.clone()).collect())
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
        let inner = self.read()?;
        let candidates = inner
            .ordered()
            .into_iter()
            .filter(|s| filter.map_or(true, |f| f.matches(&s.doc)))
            .map(|s| (s.doc.clone(), s.vector.as_slice()));
        Ok(rank(query, candidates, limit))
    }
}
