//! Similarity ranking shared by every [`VectorStore`](crate::store::VectorStore)
//! backend.
//!
//! Backends collect `(document, vector)` candidates in insertion order and
//! hand them to [`rank`], which scores, sorts, and truncates.
//!
//! # Ranking
//!
//! 1. Score each candidate with cosine similarity against the query.
//! 2. Drop candidates whose score is NaN (corrupt vectors).
//! 3. Stable-sort by score, descending, so ties keep insertion order.
//! 4. Truncate to the normalized limit.

use std::cmp::Ordering;

use serde::Serialize;

use crate::embedding::cosine_similarity;
use crate::models::{Document, QueryResultItem};

/// Result count used when the caller passes a non-positive limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// A ranked document with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub document: Document,
    pub score: f32,
}

impl From<SearchHit> for QueryResultItem {
    fn from(hit: SearchHit) -> Self {
        QueryResultItem {
            id: hit.document.id,
            content: hit.document.content,
            title: hit.document.metadata.title,
            source: hit.document.metadata.source,
            score: hit.score,
        }
    }
}

/// Map a caller-supplied limit to a usable result count.
pub fn normalize_limit(limit: i64) -> usize {
    if limit <= 0 {
        DEFAULT_SEARCH_LIMIT
    } else {
        limit as usize
    }
}

/// Score, sort, and truncate candidates supplied in insertion order.
pub fn rank<I, V>(query: &[f32], candidates: I, limit: i64) -> Vec<SearchHit>
where
    I: IntoIterator<Item = (Document, V)>,
    V: AsRef<[f32]>,
{
    let mut hits: Vec<SearchHit> = candidates
        .into_iter()
        .filter_map(|(document, vector)| {
            let score = cosine_similarity(query, vector.as_ref());
            if score.is_nan() {
                tracing::warn!(id = %document.id, "skipping document with non-finite similarity");
                return None;
            }
            Some(SearchHit { document, score })
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    hits.truncate(normalize_limit(limit));
    hits
}
