//! Query pipeline and the `recall search` command.
//!
//! A query is embedded with the configured provider, handed to the store's
//! cosine search, and mapped to the caller-facing
//! [`QueryResultItem`] shape. An empty result set is not an error.

use std::sync::Arc;

use anyhow::Result as AnyResult;
use tracing::debug;

use recall_core::chat::format_context;
use recall_core::embedding::{embed_checked, EmbeddingProvider};
use recall_core::models::{QueryRequest, QueryResultItem};
use recall_core::store::{chat_of, AllOf, DocumentFilter, FromSource, HasTag, VectorStore};
use recall_core::{Error, Result};

use crate::app::Services;

pub struct QueryEngine {
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    default_limit: i64,
}

impl QueryEngine {
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        default_limit: i64,
    ) -> Self {
        Self {
            store,
            provider,
            default_limit,
        }
    }

    /// Rank stored fragments against `text`.
    ///
    /// `limit <= 0` uses the configured default. Provider failures abort
    /// the query.
    pub async fn query(
        &self,
        text: &str,
        limit: i64,
        filter: Option<&dyn DocumentFilter>,
    ) -> Result<Vec<QueryResultItem>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("query text is empty".into()));
        }
        let limit = if limit <= 0 { self.default_limit } else { limit };

        let vector = embed_checked(self.provider.as_ref(), text, self.store.dimension()).await?;
        let hits = self.store.search(&vector, limit, filter).await?;
        debug!(query = text, limit, hits = hits.len(), "query answered");

        Ok(hits.into_iter().map(QueryResultItem::from).collect())
    }

    /// Answer a `{query, limit}` payload over the whole corpus.
    pub async fn query_request(&self, request: &QueryRequest) -> Result<Vec<QueryResultItem>> {
        self.query(&request.query, request.limit, None).await
    }
}

/// Optional scoping for `recall search`.
#[derive(Debug, Clone, Default)]
pub struct SearchScope {
    pub tag: Option<String>,
    pub source: Option<String>,
    pub character: Option<String>,
}

impl SearchScope {
    pub fn to_filter(&self) -> AllOf {
        let mut filter = AllOf::new();
        if let Some(tag) = &self.tag {
            filter = filter.with(HasTag(tag.clone()));
        }
        if let Some(source) = &self.source {
            filter = filter.with(FromSource(source.clone()));
        }
        if let Some(character) = &self.character {
            filter = filter.with(chat_of(character));
        }
        filter
    }
}

/// Output style for `recall search`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutput {
    Text,
    Json,
    /// Numbered block ready to paste into a prompt.
    Context,
}

pub async fn run_search(
    services: &Services,
    query: &str,
    limit: Option<i64>,
    scope: &SearchScope,
    output: SearchOutput,
) -> AnyResult<()> {
    let filter = scope.to_filter();
    let filter_ref: Option<&dyn DocumentFilter> = if filter.is_empty() {
        None
    } else {
        Some(&filter)
    };

    let results = services
        .query
        .query(query, limit.unwrap_or(0), filter_ref)
        .await?;

    match output {
        SearchOutput::Json => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        SearchOutput::Context => {
            if results.is_empty() {
                return Ok(());
            }
            let label = if scope.character.is_some() {
                "chat history"
            } else {
                "the knowledge base"
            };
            let fragments: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
            print!("{}", format_context(&fragments, label));
        }
        SearchOutput::Text => {
            if results.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, result) in results.iter().enumerate() {
                let title = if result.title.is_empty() {
                    "(untitled)"
                } else {
                    result.title.as_str()
                };
                println!("{}. [{:.3}] {} / {}", i + 1, result.score, result.source, title);
                println!(
                    "    excerpt: \"{}\"",
                    excerpt(&result.content, 160).replace('\n', " ").trim()
                );
                println!("    id: {}", result.id);
                println!();
            }
        }
    }
    Ok(())
}

/// First `max_chars` characters of `text`, with an ellipsis if cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::embedding::HashEmbedder;
    use recall_core::models::{Document, Metadata};
    use recall_core::store::memory::InMemoryStore;

    fn doc(id: &str, content: &str, source: &str, tag: &str) -> Document {
        let mut metadata = Metadata {
            source: source.into(),
            title: id.into(),
            chunk_index: 0,
            chunk_count: 1,
            ..Default::default()
        };
        metadata.tags.insert(tag.into());
        Document {
            id: id.into(),
            content: content.into(),
            metadata,
        }
    }

    async fn engine() -> QueryEngine {
        let embedder = HashEmbedder::new(32);
        let store = Arc::new(InMemoryStore::new(32));
        for d in [
            doc("a", "dragons hoard gold", "lore.md", "md"),
            doc("b", "the tavern serves ale", "notes.txt", "txt"),
        ] {
            store.add(&d, &embedder.embed_sync(&d.content)).await.unwrap();
        }
        QueryEngine::new(store, Arc::new(embedder), 5)
    }

    #[tokio::test]
    async fn test_query_ranks_matching_document_first() {
        let engine = engine().await;
        let results = engine.query("dragons hoard gold", 0, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert!((results[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_query_empty_text_is_invalid() {
        let engine = engine().await;
        let err = engine.query("   ", 3, None).await.unwrap_err();
        assert_eq!(err.kind(), recall_core::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_scope_filters_results() {
        let engine = engine().await;
        let scope = SearchScope {
            source: Some("notes.txt".into()),
            ..Default::default()
        };
        let filter = scope.to_filter();
        let results = engine
            .query("dragons hoard gold", 5, Some(&filter))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "b");
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("abcdef", 3), "abc…");
    }
}
