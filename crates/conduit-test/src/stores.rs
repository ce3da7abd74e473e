//! Canned similarity stores and web search backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use conduit_retrieval::{
    RetrievalError, RetrievalResult, RetrievedPassage, SimilarityStore, WebResult, WebSearch,
};

/// Returns the same passages for every query, ranked by score and cut to
/// `k`. Counts queries.
#[derive(Debug, Default)]
pub struct StaticStore {
    passages: Vec<RetrievedPassage>,
    queries: AtomicUsize,
}

impl StaticStore {
    /// A store answering with `passages`.
    #[must_use]
    pub fn new(mut passages: Vec<RetrievedPassage>) -> Self {
        passages.sort_by(|a, b| a.score.total_cmp(&b.score));
        Self {
            passages,
            queries: AtomicUsize::new(0),
        }
    }

    /// A store holding one passage.
    #[must_use]
    pub fn single(content: &str, score: f64, source_id: &str) -> Self {
        Self::new(vec![RetrievedPassage::new(content, score, source_id)])
    }

    /// Queries received so far.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl SimilarityStore for StaticStore {
    fn name(&self) -> &str {
        "static"
    }

    async fn query(&self, _text: &str, k: usize) -> RetrievalResult<Vec<RetrievedPassage>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.passages.iter().take(k).cloned().collect())
    }

    async fn len(&self) -> RetrievalResult<usize> {
        Ok(self.passages.len())
    }
}

/// Fails every query with [`RetrievalError::StoreUnavailable`].
#[derive(Debug)]
pub struct FailingStore {
    reason: String,
}

impl FailingStore {
    /// A store that always fails with `reason`.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> RetrievalError {
        RetrievalError::StoreUnavailable {
            store: "failing".to_string(),
            reason: self.reason.clone(),
        }
    }
}

#[async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl SimilarityStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn query(&self, _text: &str, _k: usize) -> RetrievalResult<Vec<RetrievedPassage>> {
        Err(self.error())
    }

    async fn len(&self) -> RetrievalResult<usize> {
        Err(self.error())
    }
}

/// Sleeps on tokio's clock before answering with no passages.
#[derive(Debug)]
pub struct SlowStore {
    delay: Duration,
}

impl SlowStore {
    /// A store that takes `delay` per query.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl SimilarityStore for SlowStore {
    fn name(&self) -> &str {
        "slow"
    }

    async fn query(&self, _text: &str, _k: usize) -> RetrievalResult<Vec<RetrievedPassage>> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn len(&self) -> RetrievalResult<usize> {
        Ok(0)
    }
}

/// Returns the same hits for every search and records the queries.
#[derive(Debug, Default)]
pub struct StaticWebSearch {
    results: Vec<WebResult>,
    queries: std::sync::Mutex<Vec<String>>,
}

impl StaticWebSearch {
    /// A backend answering with `results`.
    #[must_use]
    pub fn new(results: Vec<WebResult>) -> Self {
        Self {
            results,
            queries: std::sync::Mutex::default(),
        }
    }

    /// A backend with one hit.
    #[must_use]
    pub fn single(title: &str, url: &str, snippet: &str) -> Self {
        Self::new(vec![WebResult {
            title: title.to_string(),
            url: url.to_string(),
            snippet: snippet.to_string(),
        }])
    }

    /// Queries received so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the query log lock is poisoned.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl WebSearch for StaticWebSearch {
    fn name(&self) -> &str {
        "static-web"
    }

    async fn search(&self, query: &str, max_results: usize) -> RetrievalResult<Vec<WebResult>> {
        self.queries
            .lock()
            .expect("lock poisoned")
            .push(query.to_string());
        Ok(self.results.iter().take(max_results).cloned().collect())
    }
}
