//! Web search provider trait, HTTP implementation, and relevance scoring.
//!
//! The backend is any SearXNG-style endpoint returning JSON results. Hits
//! come back unscored; [`relevance_score`] rates them against the query so
//! web results land on the same 0..1 scale as index scores.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use hawker_core::config::WebSearchConfig;

use crate::error::SearchError;

/// Hard bounds on results per query, applied whatever the config says.
const RESULT_FLOOR: usize = 1;
const RESULT_CEILING: usize = 20;

/// Web hits scoring below this relevance are discarded.
pub const MIN_WEB_RELEVANCE: f64 = 0.1;

/// Terms whose presence marks a result as product-related.
const PRODUCT_TERMS: &[&str] = &[
    "sản phẩm",
    "giá",
    "thông số",
    "đánh giá",
    "review",
    "mua",
    "bán",
];

/// One raw hit from the web backend.
#[derive(Clone, Debug, PartialEq)]
pub struct WebHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// Backend-agnostic web search interface.
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    /// Run one search. `max_results` is clamped to 1..=20.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        region: &str,
    ) -> Result<Vec<WebHit>, SearchError>;
}

/// Rate a hit against the query on a 0..1 scale.
///
/// Query-term overlap in the title weighs 0.6, in the snippet 0.4, plus 0.1
/// per product-related term present, capped at 0.2. Matching is substring
/// over the lowercased text.
pub fn relevance_score(hit: &WebHit, query: &str) -> f64 {
    let title = hit.title.to_lowercase();
    let snippet = hit.snippet.to_lowercase();
    let query = query.to_lowercase();

    let terms: Vec<&str> = query.split_whitespace().collect();
    if terms.is_empty() {
        return 0.0;
    }

    let title_matches = terms.iter().filter(|t| title.contains(**t)).count();
    let snippet_matches = terms.iter().filter(|t| snippet.contains(**t)).count();

    let mut score = (title_matches as f64 / terms.len() as f64) * 0.6;
    score += (snippet_matches as f64 / terms.len() as f64) * 0.4;

    let product_matches = PRODUCT_TERMS
        .iter()
        .filter(|t| title.contains(**t) || snippet.contains(**t))
        .count();
    score += (product_matches as f64 * 0.1).min(0.2);

    score.min(1.0)
}

fn clamp_results(requested: usize) -> usize {
    requested.clamp(RESULT_FLOOR, RESULT_CEILING)
}

// =============================================================================
// HTTP implementation
// =============================================================================

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    results: Vec<WireResult>,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: String,
}

/// Web search over a SearXNG-style JSON endpoint.
pub struct HttpWebSearch {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWebSearch {
    /// Build the provider from config. Fails when web search is disabled or
    /// no endpoint is configured.
    pub fn new(config: &WebSearchConfig) -> Result<Self, SearchError> {
        if !config.enabled || config.base_url.trim().is_empty() {
            return Err(SearchError::WebDisabled);
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchError::Web(format!("client build: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/search", self.base_url)
    }
}

#[async_trait]
impl WebSearchProvider for HttpWebSearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        region: &str,
    ) -> Result<Vec<WebHit>, SearchError> {
        let limit = clamp_results(max_results);
        debug!(query = %query, limit, region = %region, "Web search");

        let response = self
            .client
            .get(self.endpoint())
            .query(&[("q", query), ("format", "json"), ("language", region)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Web("request timed out".to_string())
                } else {
                    SearchError::Web(format!("transport: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Web(format!("HTTP {}", status.as_u16())));
        }

        let body: WireResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Web(format!("decode: {}", e)))?;

        Ok(body
            .results
            .into_iter()
            .take(limit)
            .map(|r| WebHit {
                title: r.title,
                snippet: r.content,
                url: r.url,
            })
            .collect())
    }
}

// =============================================================================
// Mock
// =============================================================================

/// Scripted web search for tests.
///
/// Outcomes are consumed front-to-back, one per `search` call; an exhausted
/// script returns no hits (a normal empty web result). Queries are recorded
/// for assertion.
#[derive(Default)]
pub struct MockWebSearch {
    script: std::sync::Mutex<std::collections::VecDeque<Result<Vec<WebHit>, SearchError>>>,
    queries: std::sync::Mutex<Vec<String>>,
}

impl MockWebSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one batch of hits.
    pub fn push_hits(&self, hits: Vec<WebHit>) {
        self.script.lock().unwrap().push_back(Ok(hits));
    }

    /// Queue a failure.
    pub fn push_err(&self, err: SearchError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    /// Queries received so far, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Number of `search` calls made.
    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl WebSearchProvider for MockWebSearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        _region: &str,
    ) -> Result<Vec<WebHit>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(hits)) => Ok(hits.into_iter().take(clamp_results(max_results)).collect()),
            Some(Err(e)) => Err(e),
            None => Ok(Vec::new()),
        }
    }
}
