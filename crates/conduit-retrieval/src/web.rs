//! Public web search.
//!
//! [`WebSearch`] is the backend behind the agent's `web_search` tool.
//! [`DuckDuckGoSearch`] queries the DuckDuckGo instant-answer API, which
//! needs no key and returns JSON.

use std::fmt::Write as _;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RetrievalError, RetrievalResult};

const DEFAULT_DUCKDUCKGO_URL: &str = "https://api.duckduckgo.com/";

/// Default number of web results handed to the model.
pub const DEFAULT_WEB_RESULTS: usize = 5;

/// One web search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebResult {
    /// Headline or topic name.
    pub title: String,
    /// Link to the page.
    pub url: String,
    /// Short excerpt.
    pub snippet: String,
}

/// Narrow interface to a web search engine.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Backend name, for logs and errors.
    fn name(&self) -> &str;

    /// Return at most `max_results` hits for `query`.
    async fn search(&self, query: &str, max_results: usize) -> RetrievalResult<Vec<WebResult>>;
}

/// DuckDuckGo instant-answer backend.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: Client,
    base_url: String,
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl DuckDuckGoSearch {
    /// Use the public endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_DUCKDUCKGO_URL)
    }

    /// Use a different endpoint.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn failure(&self, reason: impl Into<String>) -> RetrievalError {
        RetrievalError::WebSearchFailed {
            backend: self.name().to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> RetrievalResult<Vec<WebResult>> {
        if max_results == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        debug!(backend = self.name(), max_results, "Searching the web");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| self.failure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.failure(format!("HTTP {}", status.as_u16())));
        }

        let body: InstantAnswer = response
            .json()
            .await
            .map_err(|e| self.failure(format!("invalid response: {e}")))?;
        Ok(body.into_results(max_results))
    }
}

/// Render hits as a numbered block for the model.
#[must_use]
pub fn format_web_results(results: &[WebResult]) -> String {
    let mut out = String::new();
    for (i, r) in results.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let _ = write!(out, "[{}] {} ({})\n{}", i.saturating_add(1), r.title, r.url, r.snippet);
    }
    out
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    results: Vec<Topic>,
    #[serde(default)]
    related_topics: Vec<Topic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Topic {
    #[serde(default)]
    text: String,
    #[serde(default, rename = "FirstURL")]
    first_url: String,
    // Category groups nest their topics one level down.
    #[serde(default)]
    topics: Vec<Topic>,
}

impl InstantAnswer {
    /// Direct results, then the abstract, then related topics.
    fn into_results(self, max_results: usize) -> Vec<WebResult> {
        let mut out = Vec::new();
        let abstract_hit = (!self.abstract_text.is_empty()).then(|| WebResult {
            title: self.heading.clone(),
            url: self.abstract_url.clone(),
            snippet: self.abstract_text.clone(),
        });

        let direct = self.results.into_iter().filter_map(Topic::into_result);
        let related = self
            .related_topics
            .into_iter()
            .flat_map(|t| {
                if t.topics.is_empty() {
                    vec![t]
                } else {
                    t.topics
                }
            })
            .filter_map(Topic::into_result);

        for hit in direct.chain(abstract_hit).chain(related) {
            if out.len() >= max_results {
                break;
            }
            if out.iter().all(|r: &WebResult| r.url != hit.url) {
                out.push(hit);
            }
        }
        out
    }
}

impl Topic {
    fn into_result(self) -> Option<WebResult> {
        if self.text.is_empty() || self.first_url.is_empty() {
            return None;
        }
        // Topic text reads "Title - description".
        let title = self
            .text
            .split_once(" - ")
            .map_or(self.text.as_str(), |(t, _)| t)
            .to_string();
        Some(WebResult {
            title,
            url: self.first_url,
            snippet: self.text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUST_ANSWER: &str = r#"{
        "Heading": "Rust (programming language)",
        "AbstractText": "Rust is a general-purpose programming language.",
        "AbstractURL": "https://en.wikipedia.org/wiki/Rust_(programming_language)",
        "Results": [
            {"Text": "Official site", "FirstURL": "https://www.rust-lang.org/"}
        ],
        "RelatedTopics": [
            {"Text": "Cargo - Rust package manager", "FirstURL": "https://duckduckgo.com/Cargo"},
            {"Name": "Tools", "Topics": [
                {"Text": "Clippy - Rust linter", "FirstURL": "https://duckduckgo.com/Clippy"},
                {"Text": "", "FirstURL": "https://duckduckgo.com/empty"}
            ]},
            {"Text": "Official site duplicate", "FirstURL": "https://www.rust-lang.org/"}
        ]
    }"#;

    fn parse(body: &str) -> InstantAnswer {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_results_order_and_dedup() {
        let results = parse(RUST_ANSWER).into_results(10);
        let urls: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            [
                "https://www.rust-lang.org/",
                "https://en.wikipedia.org/wiki/Rust_(programming_language)",
                "https://duckduckgo.com/Cargo",
                "https://duckduckgo.com/Clippy",
            ]
        );
        assert_eq!(results[2].title, "Cargo");
        assert_eq!(results[1].title, "Rust (programming language)");
    }

    #[test]
    fn test_results_capped() {
        assert_eq!(parse(RUST_ANSWER).into_results(2).len(), 2);
        assert!(parse("{}").into_results(5).is_empty());
    }

    #[test]
    fn test_format_web_results() {
        let text = format_web_results(&parse(RUST_ANSWER).into_results(2));
        assert!(text.starts_with("[1] Official site (https://www.rust-lang.org/)"));
        assert!(text.contains("\n\n[2] Rust (programming language)"));
    }

    #[tokio::test]
    async fn test_blank_query_skips_network() {
        let search = DuckDuckGoSearch::with_base_url("http://127.0.0.1:9/unreachable");
        assert!(search.search("   ", 5).await.unwrap().is_empty());
        assert!(search.search("rust", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_an_error() {
        let search = DuckDuckGoSearch::with_base_url("http://127.0.0.1:9/unreachable");
        let err = search.search("rust", 5).await.unwrap_err();
        assert!(matches!(err, RetrievalError::WebSearchFailed { ref backend, .. } if backend == "duckduckgo"));
    }
}
