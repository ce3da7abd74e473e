//! Retrieval gate: whether to query the store, and whether to trust the
//! result.
//!
//! | Mode    | Query store | Inject when                       |
//! |---------|-------------|-----------------------------------|
//! | `chat`  | never       | never                             |
//! | `rag`   | always      | at least one passage came back    |
//! | `auto`  | always      | best distance `<=` threshold      |
//! | `agent` | on request  | best distance `<=` threshold      |
//!
//! `rag` trusts the user's explicit request for grounding and injects every
//! passage; `auto` trusts the score and injects only passages within the
//! threshold.

use conduit_core::OperatingMode;
use tracing::{debug, warn};

use crate::error::{RetrievalError, RetrievalResult};
use crate::store::{RetrievedPassage, SimilarityStore};

/// Default number of passages to retrieve.
pub const DEFAULT_K: usize = 4;

/// Default distance threshold for `auto` mode.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 1.5;

/// What the gate decided for one query.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// The mode never retrieves.
    Skipped,
    /// Passages to inject, ordered by ascending distance.
    Grounded(Vec<RetrievedPassage>),
    /// Retrieval ran but nothing is usable; answer ungrounded.
    NoUsableContext {
        /// Best distance seen, if any passage came back.
        best_score: Option<f64>,
    },
    /// The store failed; answer ungrounded.
    StoreUnavailable(RetrievalError),
}

impl GateOutcome {
    /// Passages to inject, if any.
    #[must_use]
    pub fn passages(&self) -> Option<&[RetrievedPassage]> {
        match self {
            Self::Grounded(p) => Some(p),
            _ => None,
        }
    }
}

/// Score-threshold retrieval policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalGate {
    k: usize,
    threshold: f64,
}

impl Default for RetrievalGate {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

impl RetrievalGate {
    /// Create a gate with the default `k` and threshold.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of passages to request.
    #[must_use]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Set the `auto` distance threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Passages requested per query.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Distance threshold for `auto`.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Whether `mode` queries the store at all.
    #[must_use]
    pub fn should_retrieve(mode: OperatingMode) -> bool {
        !matches!(mode, OperatingMode::Chat)
    }

    /// Query the store for at most `k` passages, ordered by ascending
    /// distance. The ordering and cap are enforced here even if the store
    /// does not honor them.
    ///
    /// # Errors
    ///
    /// Propagates the store's error.
    pub async fn retrieve(
        query: &str,
        k: usize,
        store: &dyn SimilarityStore,
    ) -> RetrievalResult<Vec<RetrievedPassage>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut passages = store.query(query, k).await?;
        passages.sort_by(|a, b| a.score.total_cmp(&b.score));
        passages.truncate(k);
        Ok(passages)
    }

    /// Whether `passages` may be injected in `mode`.
    ///
    /// `passages` must be in ascending-distance order.
    #[must_use]
    pub fn is_usable(passages: &[RetrievedPassage], mode: OperatingMode, threshold: f64) -> bool {
        match mode {
            OperatingMode::Chat => false,
            OperatingMode::Rag => !passages.is_empty(),
            OperatingMode::Auto | OperatingMode::Agent => {
                passages.first().is_some_and(|best| best.score <= threshold)
            },
        }
    }

    /// Passages to inject once the set is usable. Score-trusting modes drop
    /// every passage beyond the threshold; `rag` keeps them all.
    #[must_use]
    pub fn select(
        mut passages: Vec<RetrievedPassage>,
        mode: OperatingMode,
        threshold: f64,
    ) -> Vec<RetrievedPassage> {
        match mode {
            OperatingMode::Auto | OperatingMode::Agent => {
                passages.retain(|p| p.score <= threshold);
            },
            OperatingMode::Chat | OperatingMode::Rag => {},
        }
        passages
    }

    /// Run the full gate for one query.
    pub async fn evaluate(
        &self,
        query: &str,
        mode: OperatingMode,
        store: &dyn SimilarityStore,
    ) -> GateOutcome {
        if !Self::should_retrieve(mode) {
            return GateOutcome::Skipped;
        }

        let passages = match Self::retrieve(query, self.k, store).await {
            Ok(p) => p,
            Err(e) => {
                warn!(store = store.name(), error = %e, "Similarity store failed, answering ungrounded");
                return GateOutcome::StoreUnavailable(e);
            },
        };

        let best_score = passages.first().map(|p| p.score);
        if Self::is_usable(&passages, mode, self.threshold) {
            let passages = Self::select(passages, mode, self.threshold);
            debug!(%mode, count = passages.len(), ?best_score, "Retrieved context is usable");
            GateOutcome::Grounded(passages)
        } else {
            debug!(%mode, ?best_score, threshold = self.threshold, "No usable context");
            GateOutcome::NoUsableContext { best_score }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn passage(score: f64) -> RetrievedPassage {
        RetrievedPassage::new("text", score, "doc")
    }

    struct Fixed(Vec<RetrievedPassage>);

    #[async_trait]
    impl SimilarityStore for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn query(&self, _text: &str, _k: usize) -> RetrievalResult<Vec<RetrievedPassage>> {
            Ok(self.0.clone())
        }
        async fn len(&self) -> RetrievalResult<usize> {
            Ok(self.0.len())
        }
    }

    struct Down;

    #[async_trait]
    impl SimilarityStore for Down {
        fn name(&self) -> &str {
            "down"
        }
        async fn query(&self, _text: &str, _k: usize) -> RetrievalResult<Vec<RetrievedPassage>> {
            Err(RetrievalError::StoreUnavailable {
                store: "down".into(),
                reason: "connection refused".into(),
            })
        }
        async fn len(&self) -> RetrievalResult<usize> {
            Ok(0)
        }
    }

    #[test]
    fn test_should_retrieve() {
        assert!(!RetrievalGate::should_retrieve(OperatingMode::Chat));
        assert!(RetrievalGate::should_retrieve(OperatingMode::Rag));
        assert!(RetrievalGate::should_retrieve(OperatingMode::Auto));
        assert!(RetrievalGate::should_retrieve(OperatingMode::Agent));
    }

    #[test]
    fn test_auto_threshold_is_inclusive() {
        let t = 1.5;
        for (s, usable) in [(0.0, true), (1.5, true), (1.500_001, false), (9.9, false)] {
            assert_eq!(
                RetrievalGate::is_usable(&[passage(s)], OperatingMode::Auto, t),
                usable,
                "score {s}"
            );
        }
        assert!(!RetrievalGate::is_usable(&[], OperatingMode::Auto, t));
        assert!(!RetrievalGate::is_usable(&[passage(f64::NAN)], OperatingMode::Auto, t));
    }

    #[test]
    fn test_rag_ignores_score() {
        for s in [0.0, 1.5, 9.9, 1e9] {
            assert!(RetrievalGate::is_usable(&[passage(s)], OperatingMode::Rag, 1.5));
        }
        assert!(!RetrievalGate::is_usable(&[], OperatingMode::Rag, 1.5));
    }

    #[test]
    fn test_chat_never_usable() {
        assert!(!RetrievalGate::is_usable(&[passage(0.0)], OperatingMode::Chat, 1.5));
    }

    #[tokio::test]
    async fn test_retrieve_sorts_and_caps() {
        let store = Fixed(vec![passage(3.0), passage(0.5), passage(1.0)]);
        let got = RetrievalGate::retrieve("q", 2, &store).await.unwrap();
        let scores: Vec<f64> = got.iter().map(|p| p.score).collect();
        assert_eq!(scores, [0.5, 1.0]);
        assert!(RetrievalGate::retrieve("q", 0, &store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rag_injects_poor_match() {
        let store = Fixed(vec![passage(9.9)]);
        let gate = RetrievalGate::new();
        let outcome = gate.evaluate("q", OperatingMode::Rag, &store).await;
        assert_eq!(outcome.passages().map(<[RetrievedPassage]>::len), Some(1));

        let outcome = gate.evaluate("q", OperatingMode::Auto, &store).await;
        assert_eq!(outcome, GateOutcome::NoUsableContext { best_score: Some(9.9) });
    }

    #[tokio::test]
    async fn test_auto_drops_passages_beyond_threshold() {
        let store = Fixed(vec![passage(9.9), passage(0.2), passage(1.5)]);
        let gate = RetrievalGate::new().with_threshold(1.5);

        let auto = gate.evaluate("q", OperatingMode::Auto, &store).await;
        let scores: Vec<f64> = auto.passages().unwrap().iter().map(|p| p.score).collect();
        assert_eq!(scores, [0.2, 1.5]);

        let rag = gate.evaluate("q", OperatingMode::Rag, &store).await;
        assert_eq!(rag.passages().map(<[RetrievedPassage]>::len), Some(3));
    }

    #[tokio::test]
    async fn test_empty_store_auto() {
        let store = Fixed(Vec::new());
        let outcome = RetrievalGate::new()
            .evaluate("hello", OperatingMode::Auto, &store)
            .await;
        assert_eq!(outcome, GateOutcome::NoUsableContext { best_score: None });
    }

    #[tokio::test]
    async fn test_chat_skips_store() {
        let outcome = RetrievalGate::new()
            .evaluate("hello", OperatingMode::Chat, &Down)
            .await;
        assert_eq!(outcome, GateOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_store_failure_reported() {
        let outcome = RetrievalGate::new()
            .evaluate("hello", OperatingMode::Rag, &Down)
            .await;
        assert!(matches!(outcome, GateOutcome::StoreUnavailable(_)));
    }
}
