//! Evidence aggregation across the product index and the web.
//!
//! Internal results come first. The web joins in only when the catalog has
//! too little to say (too few hits, weak best score) or the question is a
//! comparison, where outside opinions genuinely help. Whatever the mix, the
//! merged pool is deduplicated, brand-capped, and scored on one 0..1 scale.
//!
//! Only internal results are purchasable; external ones are reference
//! material and carry their origin in the metadata. The pool itself keeps
//! internal identifiers for validation; [`EvidencePool::presentable`]
//! produces the id-free copies handed to answer generation.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use hawker_core::config::{SearchConfig, WebSearchConfig};
use hawker_core::text::format_vnd;
use hawker_core::types::{Product, SearchResult, SourceType};

use crate::dedup::Deduplicator;
use crate::embedding::DynEmbeddingService;
use crate::error::SearchError;
use crate::index::ProductIndex;
use crate::web::{relevance_score, WebSearchProvider, MIN_WEB_RELEVANCE};

/// Queries containing these are comparisons, best served with web context.
const COMPARISON_TRIGGERS: &[&str] = &["so sánh", "khác nhau", "tốt hơn", "vs", "versus"];

/// The candidate set behind one reply.
#[derive(Clone, Debug)]
pub struct EvidencePool {
    /// Deduplicated, diversity-capped results, best first.
    pub results: Vec<SearchResult>,
    /// True when the internal index could not be queried and the pool is
    /// web-only. Replies built on it must say so.
    pub degraded: bool,
    /// True when web results made it into the pool.
    pub used_web: bool,
}

impl EvidencePool {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn internal(&self) -> impl Iterator<Item = &SearchResult> {
        self.results
            .iter()
            .filter(|r| r.source == SourceType::Internal)
    }

    pub fn external(&self) -> impl Iterator<Item = &SearchResult> {
        self.results
            .iter()
            .filter(|r| r.source == SourceType::External)
    }

    /// Copies safe to hand to answer generation: no product ids, no `id:`
    /// lines in snippets. The pool itself stays intact for validation.
    pub fn presentable(&self) -> Vec<SearchResult> {
        self.results
            .iter()
            .map(|r| {
                let mut cleaned = r.clone();
                cleaned.product_id = None;
                cleaned.snippet = strip_id_lines(&r.snippet);
                cleaned
            })
            .collect()
    }
}

/// Merges catalog and web search into one evidence pool.
pub struct SearchAggregator {
    embedding: Arc<dyn DynEmbeddingService>,
    index: ProductIndex,
    web: Option<Arc<dyn WebSearchProvider>>,
    dedup: Deduplicator,
    min_internal_results: usize,
    min_relevance: f64,
    web_max_results: usize,
    region: String,
}

impl SearchAggregator {
    pub fn new(
        embedding: Arc<dyn DynEmbeddingService>,
        index: ProductIndex,
        web: Option<Arc<dyn WebSearchProvider>>,
        search: &SearchConfig,
        web_config: &WebSearchConfig,
    ) -> Self {
        Self {
            embedding,
            index,
            web,
            dedup: Deduplicator::new(search.dedup_threshold, search.max_per_brand),
            min_internal_results: search.min_internal_results,
            min_relevance: search.min_relevance,
            web_max_results: web_config.max_results,
            region: web_config.region.clone(),
        }
    }

    /// Assemble the evidence pool for a query. Never fails: source trouble
    /// shrinks the pool and sets `degraded`, an empty pool is the caller's
    /// signal to answer honestly that nothing was found.
    pub async fn search(&self, query: &str, top_k: usize) -> EvidencePool {
        let mut pool: Vec<SearchResult> = Vec::new();
        let mut degraded = false;

        match self.internal_phase(query, top_k).await {
            Ok(results) => pool.extend(results),
            Err(e) => {
                warn!(error = %e, "Internal search unavailable, degrading to web only");
                degraded = true;
            }
        }

        let need_web = degraded
            || pool.len() < self.min_internal_results
            || pool.first().map_or(true, |r| r.score < self.min_relevance)
            || is_comparison_query(query);

        if need_web {
            if let Some(web) = &self.web {
                match web.search(query, self.web_max_results, &self.region).await {
                    Ok(hits) => {
                        let external: Vec<SearchResult> = hits
                            .into_iter()
                            .map(|hit| {
                                let score = relevance_score(&hit, query);
                                SearchResult {
                                    source: SourceType::External,
                                    product_id: None,
                                    title: hit.title,
                                    snippet: hit.snippet,
                                    score,
                                    metadata: json!({ "url": hit.url }),
                                }
                            })
                            .filter(|r| r.score >= MIN_WEB_RELEVANCE)
                            .collect();
                        debug!(count = external.len(), "Web results joined the pool");
                        pool.extend(external);
                    }
                    Err(e) => warn!(error = %e, "Web search failed"),
                }
            }
        }

        let mut results = self.dedup.apply(pool);
        results.truncate(top_k);
        let used_web = results.iter().any(|r| r.source == SourceType::External);

        debug!(
            total = results.len(),
            degraded, used_web, "Evidence pool assembled"
        );
        EvidencePool {
            results,
            degraded,
            used_web,
        }
    }

    async fn internal_phase(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let embedding = self.embedding.embed_boxed(query).await?;
        let hits = self.index.query(&embedding, top_k)?;
        Ok(hits
            .into_iter()
            .filter(|(_, score)| *score >= self.min_relevance)
            .map(|(product, score)| internal_result(&product, score))
            .collect())
    }
}

/// True when the query asks to compare rather than to buy one thing.
pub fn is_comparison_query(query: &str) -> bool {
    let query = query.to_lowercase();
    COMPARISON_TRIGGERS.iter().any(|t| query.contains(t))
}

/// Remove `id:` lines wherever they appear in a text block.
pub fn strip_id_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().to_lowercase().starts_with("id:"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn internal_result(product: &Product, score: f64) -> SearchResult {
    SearchResult {
        source: SourceType::Internal,
        product_id: Some(product.id),
        title: product.name.clone(),
        snippet: product_snippet(product),
        score,
        metadata: json!({
            "brand": product.brand,
            "price": product.price,
            "price_text": format_vnd(product.price),
        }),
    }
}

/// Catalog entry rendered as the datasheet text the model reads. The `id:`
/// line stays in the trace copy and is stripped before presentation.
fn product_snippet(product: &Product) -> String {
    let mut lines = vec![
        format!("id: {}", product.id),
        format!("Thương hiệu: {}", product.brand),
        format!("Giá: {}", format_vnd(product.price)),
    ];
    for (key, value) in &product.attributes {
        lines.push(format!("{}: {}", key, value));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use crate::embedding::{EmbeddingService, HashEmbedding};
    use crate::web::{MockWebSearch, WebHit};

    struct FailingEmbedding;

    impl EmbeddingService for FailingEmbedding {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, SearchError> {
            Err(SearchError::Embedding("model offline".to_string()))
        }

        fn dimensions(&self) -> usize {
            64
        }
    }

    async fn seed(index: &ProductIndex, embedding: &HashEmbedding, name: &str, brand: &str) {
        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            brand: brand.to_string(),
            price: 24_990_000,
            attributes: vec![("RAM".to_string(), "8GB".to_string())],
        };
        let vector = embedding.embed(name).await.unwrap();
        index.insert(product, vector).unwrap();
    }

    fn config(min_internal: usize, min_relevance: f64) -> SearchConfig {
        SearchConfig {
            min_internal_results: min_internal,
            min_relevance,
            embedding_dim: 64,
            ..SearchConfig::default()
        }
    }

    fn aggregator(
        embedding: Arc<dyn DynEmbeddingService>,
        index: ProductIndex,
        web: Option<Arc<dyn WebSearchProvider>>,
        search: &SearchConfig,
    ) -> SearchAggregator {
        SearchAggregator::new(embedding, index, web, search, &WebSearchConfig::default())
    }

    #[tokio::test]
    async fn test_sufficient_internal_skips_web() {
        let embedding = Arc::new(HashEmbedding::new(64));
        let index = ProductIndex::new();
        seed(&index, &embedding, "iPhone 15", "Apple").await;

        let mock = Arc::new(MockWebSearch::new());
        let agg = aggregator(
            embedding,
            index,
            Some(mock.clone()),
            &config(1, 0.3),
        );

        let pool = agg.search("iPhone 15", 5).await;
        assert_eq!(mock.calls(), 0);
        assert!(!pool.used_web);
        assert!(!pool.degraded);
        assert_eq!(pool.results.len(), 1);
        assert_eq!(pool.results[0].source, SourceType::Internal);
        assert!((pool.results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_insufficient_internal_augments_with_web() {
        let embedding = Arc::new(HashEmbedding::new(64));
        let index = ProductIndex::new();
        seed(&index, &embedding, "iPhone 15", "Apple").await;

        let mock = Arc::new(MockWebSearch::new());
        mock.push_hits(vec![WebHit {
            title: "iPhone 15 đánh giá chi tiết".to_string(),
            snippet: "Giá iPhone 15 hiện tại".to_string(),
            url: "https://review.vn/iphone-15".to_string(),
        }]);

        let agg = aggregator(embedding, index, Some(mock.clone()), &config(2, 0.3));

        let pool = agg.search("iPhone 15", 5).await;
        assert_eq!(mock.calls(), 1);
        assert!(pool.used_web);
        assert!(!pool.degraded);
        assert_eq!(pool.results.len(), 2);
        // Internal outranks the equally scored web hit
        assert_eq!(pool.results[0].source, SourceType::Internal);
        assert_eq!(pool.results[1].source, SourceType::External);
        assert_eq!(pool.results[1].product_id, None);
    }

    #[tokio::test]
    async fn test_irrelevant_web_hits_filtered() {
        let embedding = Arc::new(HashEmbedding::new(64));
        let index = ProductIndex::new();
        seed(&index, &embedding, "iPhone 15", "Apple").await;

        let mock = Arc::new(MockWebSearch::new());
        mock.push_hits(vec![WebHit {
            title: "Thời tiết Hà Nội".to_string(),
            snippet: "Dự báo mưa".to_string(),
            url: "https://weather.vn".to_string(),
        }]);

        let agg = aggregator(embedding, index, Some(mock.clone()), &config(2, 0.3));

        let pool = agg.search("iPhone 15", 5).await;
        assert_eq!(mock.calls(), 1);
        assert!(!pool.used_web);
        assert_eq!(pool.results.len(), 1);
        assert_eq!(pool.results[0].source, SourceType::Internal);
    }

    #[tokio::test]
    async fn test_comparison_query_triggers_web() {
        let embedding = Arc::new(HashEmbedding::new(64));
        let index = ProductIndex::new();
        seed(&index, &embedding, "iPhone 15", "Apple").await;

        let mock = Arc::new(MockWebSearch::new());
        // min_internal 0 and a bottomless relevance floor isolate the
        // comparison trigger from the count/score triggers
        let agg = aggregator(
            embedding,
            index,
            Some(mock.clone()),
            &config(0, -1.0),
        );

        agg.search("so sánh iphone 15 và galaxy s24", 5).await;
        assert_eq!(mock.calls(), 1);

        agg.search("điện thoại pin khoẻ", 5).await;
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_web_failure_keeps_internal_results() {
        let embedding = Arc::new(HashEmbedding::new(64));
        let index = ProductIndex::new();
        seed(&index, &embedding, "iPhone 15", "Apple").await;

        let mock = Arc::new(MockWebSearch::new());
        mock.push_err(SearchError::Web("HTTP 502".to_string()));

        let agg = aggregator(embedding, index, Some(mock.clone()), &config(2, 0.3));

        let pool = agg.search("iPhone 15", 5).await;
        assert_eq!(mock.calls(), 1);
        assert_eq!(pool.results.len(), 1);
        assert!(!pool.used_web);
        assert!(!pool.degraded);
    }

    #[tokio::test]
    async fn test_index_failure_degrades_to_web_only() {
        let index = ProductIndex::new();
        let mock = Arc::new(MockWebSearch::new());
        mock.push_hits(vec![WebHit {
            title: "iPhone 15 giá bao nhiêu".to_string(),
            snippet: "Cập nhật giá iPhone 15".to_string(),
            url: "https://news.vn/iphone".to_string(),
        }]);

        let agg = aggregator(
            Arc::new(FailingEmbedding),
            index,
            Some(mock.clone()),
            &config(2, 0.3),
        );

        let pool = agg.search("iPhone 15 giá", 5).await;
        assert!(pool.degraded);
        assert!(pool.used_web);
        assert_eq!(pool.results.len(), 1);
        assert_eq!(pool.results[0].source, SourceType::External);
    }

    #[tokio::test]
    async fn test_nothing_available_returns_empty_pool() {
        let embedding = Arc::new(HashEmbedding::new(64));
        let index = ProductIndex::new();

        let agg = aggregator(embedding, index, None, &config(2, 0.3));

        let pool = agg.search("iPhone 15", 5).await;
        assert!(pool.is_empty());
        assert!(!pool.degraded);
        assert!(!pool.used_web);
    }

    #[tokio::test]
    async fn test_top_k_truncation() {
        let embedding = Arc::new(HashEmbedding::new(64));
        let index = ProductIndex::new();
        seed(&index, &embedding, "iPhone 15", "Apple").await;

        let mock = Arc::new(MockWebSearch::new());
        mock.push_hits(vec![WebHit {
            title: "Samsung Galaxy S24 đánh giá".to_string(),
            snippet: "Giá Samsung Galaxy S24".to_string(),
            url: "https://review.vn/s24".to_string(),
        }]);

        let agg = aggregator(embedding, index, Some(mock.clone()), &config(2, 0.3));

        let pool = agg.search("iPhone 15", 1).await;
        assert_eq!(pool.results.len(), 1);
        assert_eq!(pool.results[0].source, SourceType::Internal);
    }

    #[tokio::test]
    async fn test_presentable_strips_internal_ids() {
        let embedding = Arc::new(HashEmbedding::new(64));
        let index = ProductIndex::new();
        seed(&index, &embedding, "iPhone 15", "Apple").await;

        let agg = aggregator(embedding, index, None, &config(1, 0.3));
        let pool = agg.search("iPhone 15", 5).await;

        // The trace copy keeps the identifiers
        assert!(pool.results[0].snippet.contains("id:"));
        assert!(pool.results[0].product_id.is_some());

        let presentable = pool.presentable();
        assert!(!presentable[0].snippet.contains("id:"));
        assert_eq!(presentable[0].product_id, None);
        // The rest of the datasheet survives
        assert!(presentable[0].snippet.contains("Thương hiệu: Apple"));
        assert!(presentable[0].snippet.contains("Giá: 24.990.000đ"));
    }

    #[tokio::test]
    async fn test_pool_source_iterators() {
        let embedding = Arc::new(HashEmbedding::new(64));
        let index = ProductIndex::new();
        seed(&index, &embedding, "iPhone 15", "Apple").await;

        let mock = Arc::new(MockWebSearch::new());
        mock.push_hits(vec![WebHit {
            title: "Galaxy S24 review".to_string(),
            snippet: "Đánh giá Galaxy S24 giá tốt".to_string(),
            url: "https://review.vn/s24".to_string(),
        }]);

        let agg = aggregator(embedding, index, Some(mock), &config(2, 0.3));
        let pool = agg.search("iPhone 15", 5).await;

        assert_eq!(pool.internal().count(), 1);
        assert_eq!(pool.external().count(), 1);
    }

    #[test]
    fn test_is_comparison_query() {
        assert!(is_comparison_query("So sánh iPhone 15 và Galaxy S24"));
        assert!(is_comparison_query("iphone 15 vs galaxy s24"));
        assert!(is_comparison_query("máy nào tốt hơn"));
        assert!(!is_comparison_query("mua iphone 15"));
        assert!(!is_comparison_query("iphone 15 còn hàng không"));
    }

    #[test]
    fn test_strip_id_lines() {
        let text = "id: 550e8400-e29b-41d4-a716-446655440000\nThương hiệu: Apple\n  ID: 42\nGiá: 24.990.000đ";
        let cleaned = strip_id_lines(text);
        assert_eq!(cleaned, "Thương hiệu: Apple\nGiá: 24.990.000đ");
    }

    #[test]
    fn test_strip_id_lines_untouched_text() {
        let text = "Thương hiệu: Apple\nGiá: 24.990.000đ";
        assert_eq!(strip_id_lines(text), text);
    }
}
