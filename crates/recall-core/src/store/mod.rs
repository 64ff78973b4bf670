//! Storage abstraction for Recall.
//!
//! The [`VectorStore`] trait defines the document + vector operations needed
//! by the ingestion and query pipelines, enabling pluggable backends (the
//! SQLite + vector-file store in the app crate, the in-memory store here).
//!
//! Implementations must be `Send + Sync` and must give writers exclusive
//! access: `add`/`delete` never interleave with each other or with reads,
//! so `search` never observes a half-written document/vector pair.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Document, Vector};
use crate::search::SearchHit;

/// Predicate over stored documents, used to scope `search`, `list_where`,
/// and `delete_where`.
///
/// Closures of type `Fn(&Document) -> bool` implement it directly.
pub trait DocumentFilter: Send + Sync {
    fn matches(&self, doc: &Document) -> bool;
}

impl<F> DocumentFilter for F
where
    F: Fn(&Document) -> bool + Send + Sync,
{
    fn matches(&self, doc: &Document) -> bool {
        self(doc)
    }
}

/// Matches documents carrying a tag.
#[derive(Debug, Clone)]
pub struct HasTag(pub String);

impl DocumentFilter for HasTag {
    fn matches(&self, doc: &Document) -> bool {
        doc.metadata.has_tag(&self.0)
    }
}

/// Matches documents whose `metadata.source` equals the given value.
#[derive(Debug, Clone)]
pub struct FromSource(pub String);

impl DocumentFilter for FromSource {
    fn matches(&self, doc: &Document) -> bool {
        doc.metadata.source == self.0
    }
}

/// Matches documents whose custom attribute `key` equals `value`.
#[derive(Debug, Clone)]
pub struct CustomEquals {
    pub key: String,
    pub value: String,
}

impl CustomEquals {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl DocumentFilter for CustomEquals {
    fn matches(&self, doc: &Document) -> bool {
        doc.metadata.custom.get(&self.key) == Some(&self.value)
    }
}

/// Conjunction of filters; an empty list matches everything.
#[derive(Default)]
pub struct AllOf(pub Vec<Box<dyn DocumentFilter>>);

impl AllOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl DocumentFilter + 'static) -> Self {
        self.0.push(Box::new(filter));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl DocumentFilter for AllOf {
    fn matches(&self, doc: &Document) -> bool {
        self.0.iter().all(|f| f.matches(doc))
    }
}

/// Documents produced from any chat with `character`.
pub fn chat_of(character: &str) -> AllOf {
    AllOf::new()
        .with(HasTag("chat".to_string()))
        .with(CustomEquals::new("character", character))
}

/// Documents produced from one specific chat transcript.
pub fn chat_id(character: &str, id: &str) -> AllOf {
    chat_of(character).with(CustomEquals::new("chat_id", id))
}

/// Abstract document + vector store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](VectorStore::add) | Upsert a document and its vector |
/// | [`get`](VectorStore::get) | Fetch a document by id |
/// | [`get_vector`](VectorStore::get_vector) | Fetch a document's vector |
/// | [`delete`](VectorStore::delete) | Remove a document and its vector |
/// | [`list`](VectorStore::list) | All documents in insertion order |
/// | [`search`](VectorStore::search) | Cosine-ranked nearest neighbours |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store-wide vector dimension.
    fn dimension(&self) -> usize;

    /// Insert or overwrite `document` together with `vector`.
    ///
    /// Re-adding an existing id is an idempotent upsert. A vector whose
    /// length differs from [`dimension`](VectorStore::dimension) is
    /// rejected with `InvalidInput` and nothing is written.
    async fn add(&self, document: &Document, vector: &[f32]) -> Result<()>;

    /// Fetch a document by id, or `NotFound`.
    async fn get(&self, id: &str) -> Result<Document>;

    /// Fetch the vector stored for `id`, or `NotFound`.
    async fn get_vector(&self, id: &str) -> Result<Vector>;

    /// Remove a document and its vector. Unknown ids are `NotFound`.
    async fn delete(&self, id: &str) -> Result<()>;

    /// All documents, in insertion order.
    async fn list(&self) -> Result<Vec<Document>>;

    /// Up to `limit` documents ranked by cosine similarity to `query`.
    ///
    /// Only documents matching `filter` are considered. Scores are strictly
    /// non-increasing; ties keep insertion order. `limit <= 0` falls back to
    /// [`DEFAULT_SEARCH_LIMIT`](crate::search::DEFAULT_SEARCH_LIMIT).
    /// Documents whose vector cannot be read are skipped.
    async fn search(
        &self,
        query: &[f32],
        limit: i64,
        filter: Option<&dyn DocumentFilter>,
    ) -> Result<Vec<SearchHit>>;

    /// Documents matching `filter`, in insertion order.
    async fn list_where(&self, filter: &dyn DocumentFilter) -> Result<Vec<Document>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|d| filter.matches(d))
            .collect())
    }

    /// Delete every document matching `filter`, returning the removed ids.
    async fn delete_where(&self, filter: &dyn DocumentFilter) -> Result<Vec<String>> {
        let ids: Vec<String> = self
            .list_where(filter)
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();
        for id in &ids {
            self.delete(id).await?;
        }
        Ok(ids)
    }

    /// Number of stored documents.
    async fn count(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }
}
