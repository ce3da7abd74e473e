//! Similarity stores.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalResult;

/// A passage returned by a similarity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// Passage text.
    pub content: String,
    /// Distance to the query. Lower is better.
    pub score: f64,
    /// Provenance (file name, URL, document id).
    pub source_id: String,
}

impl RetrievedPassage {
    /// Create a passage.
    pub fn new(content: impl Into<String>, score: f64, source_id: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            score,
            source_id: source_id.into(),
        }
    }
}

/// Narrow interface to a document index.
#[async_trait]
pub trait SimilarityStore: Send + Sync {
    /// Store name, for logs and errors.
    fn name(&self) -> &str;

    /// Return at most `k` passages ordered by ascending distance.
    async fn query(&self, text: &str, k: usize) -> RetrievalResult<Vec<RetrievedPassage>>;

    /// Number of indexed passages.
    async fn len(&self) -> RetrievalResult<usize>;

    /// Whether the store holds no passages.
    async fn is_empty(&self) -> RetrievalResult<bool> {
        Ok(self.len().await? == 0)
    }
}

#[derive(Debug, Clone)]
struct StoredPassage {
    content: String,
    source_id: String,
    terms: HashSet<String>,
}

/// In-process lexical store.
///
/// Distance is `2 * (1 - overlap)`, where `overlap` is the fraction of
/// distinct query terms that appear in the passage. The range is `0.0`
/// (every term present) to `2.0` (no term present).
#[derive(Debug, Default)]
pub struct MemoryStore {
    passages: RwLock<Vec<StoredPassage>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one passage.
    pub fn add(&self, content: impl Into<String>, source_id: impl Into<String>) {
        let content = content.into();
        let terms = terms(&content);
        self.passages
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(StoredPassage {
                content,
                source_id: source_id.into(),
                terms,
            });
    }

    /// Split `text` on blank lines and add each non-empty paragraph.
    /// Returns the number of passages added.
    pub fn add_document(&self, source_id: &str, text: &str) -> usize {
        let mut added = 0usize;
        for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            self.add(paragraph, source_id);
            added = added.saturating_add(1);
        }
        added
    }

    /// Remove every passage.
    pub fn clear(&self) {
        self.passages
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl SimilarityStore for MemoryStore {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "memory"
    }

    async fn query(&self, text: &str, k: usize) -> RetrievalResult<Vec<RetrievedPassage>> {
        let query_terms = terms(text);
        let passages = self
            .passages
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut scored: Vec<RetrievedPassage> = passages
            .iter()
            .map(|p| RetrievedPassage {
                content: p.content.clone(),
                score: distance(&query_terms, &p.terms),
                source_id: p.source_id.clone(),
            })
            .collect();
        drop(passages);

        scored.sort_by(|a, b| a.score.total_cmp(&b.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn len(&self) -> RetrievalResult<usize> {
        Ok(self
            .passages
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len())
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn distance(query: &HashSet<String>, passage: &HashSet<String>) -> f64 {
    if query.is_empty() {
        return 2.0;
    }
    let hits = query.iter().filter(|t| passage.contains(*t)).count();
    let overlap = hits as f64 / query.len() as f64;
    2.0 * (1.0 - overlap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let store = MemoryStore::new();
        assert!(store.query("hello", 4).await.unwrap().is_empty());
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_ranking_ascending_and_capped() {
        let store = MemoryStore::new();
        store.add("Annual leave is 15 days per year.", "handbook.md");
        store.add("The cafeteria opens at noon.", "facilities.md");
        store.add("Leave requests go to your manager.", "handbook.md");

        let results = store.query("annual leave days", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score <= results[1].score);
        assert!(results[0].content.starts_with("Annual leave"));
        assert!(results[0].score.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_unrelated_query_scores_two() {
        let store = MemoryStore::new();
        store.add("Annual leave is 15 days.", "handbook.md");
        let results = store.query("quantum chromodynamics", 4).await.unwrap();
        assert!((results[0].score - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_add_document_splits_paragraphs() {
        let store = MemoryStore::new();
        let added = store.add_document("notes.txt", "first para\n\n\n  second para  \n\n");
        assert_eq!(added, 2);
        assert_eq!(store.len().await.unwrap(), 2);
        store.clear();
        assert_eq!(store.len().await.unwrap(), 0);
    }
}
