//! Consultation answers grounded in retrieved evidence.
//!
//! Every answer is generated from an explicit evidence block: catalog
//! results first, web reference afterwards with its disclaimer. An empty
//! pool short-circuits to a fixed honest reply without touching the model.

use std::sync::Arc;

use tracing::warn;

use hawker_core::config::{LlmConfig, SearchConfig};
use hawker_core::types::{SearchResult, SourceType};
use hawker_llm::{CompletionRequest, LlmClient, TokenStream};
use hawker_search::aggregator::strip_id_lines;
use hawker_search::{EvidencePool, SearchAggregator};

/// Fixed reply when no evidence is available at all.
pub const NO_INFORMATION: &str = "Tôi không có thông tin về điều này.";

/// Prefixed to replies built while the shop catalog is unreachable.
pub const DEGRADED_NOTICE: &str = "Hệ thống tra cứu của cửa hàng đang gián đoạn, \
thông tin dưới đây chỉ mang tính tham khảo.";

const SYSTEM_PROMPT: &str = "\
Bạn là trợ lý tư vấn của một cửa hàng điện thoại. Hãy trả lời câu hỏi của khách \
dựa trên thông tin sản phẩm được cung cấp bên dưới.

Yêu cầu:
1. Trả lời ngắn gọn, chính xác và chuyên nghiệp bằng tiếng Việt.
2. Ưu tiên thông tin từ cửa hàng.
3. Chỉ nói về các sản phẩm có trong phần thông tin bên dưới.
4. Nếu không tìm thấy thông tin trong bối cảnh, hãy nói \"Tôi không có thông tin về điều này.\"
5. Khi dùng thông tin tham khảo từ web, hãy ghi rõ nguồn và nói rõ cửa hàng không kinh doanh sản phẩm đó.
6. Nếu khách yêu cầu so sánh, hãy so sánh dựa trên thông số kỹ thuật có sẵn.";

// =============================================================================
// ConsultationHandler
// =============================================================================

/// A generated answer together with the evidence it was built on.
pub struct ConsultationOutcome {
    pub text: String,
    pub pool: EvidencePool,
    /// The model call failed and `text` is the fixed fallback.
    pub llm_failed: bool,
}

/// A streaming answer. The pool is final before the first token.
pub struct ConsultationStream {
    pub stream: TokenStream,
    pub pool: EvidencePool,
    /// The stream could not be opened and a fixed chunk is served instead.
    pub llm_failed: bool,
}

/// Generates evidence-grounded consultation answers.
pub struct ConsultationHandler {
    aggregator: SearchAggregator,
    llm: Arc<dyn LlmClient>,
    top_k: usize,
    max_tokens: u32,
    temperature: f64,
}

impl ConsultationHandler {
    pub fn new(
        aggregator: SearchAggregator,
        llm: Arc<dyn LlmClient>,
        search: &SearchConfig,
        llm_config: &LlmConfig,
    ) -> Self {
        Self {
            aggregator,
            llm,
            top_k: search.top_k,
            max_tokens: llm_config.max_tokens,
            temperature: llm_config.answer_temperature,
        }
    }

    /// Retrieve evidence and generate a grounded answer.
    ///
    /// Never fails: model trouble degrades to the fixed unavailable reply
    /// and is reported through `llm_failed`.
    pub async fn answer(&self, question: &str) -> ConsultationOutcome {
        let pool = self.aggregator.search(question, self.top_k).await;
        if pool.is_empty() {
            return ConsultationOutcome {
                text: NO_INFORMATION.to_string(),
                pool,
                llm_failed: false,
            };
        }

        let request = self.request(build_prompt(question, &pool));
        let (text, llm_failed) = match self.llm.complete(&request).await {
            Ok(raw) => (strip_id_lines(raw.trim()), false),
            Err(error) => {
                warn!(%error, "consultation answer generation failed");
                (NO_INFORMATION.to_string(), true)
            }
        };

        ConsultationOutcome {
            text: with_degraded_notice(text, pool.degraded),
            pool,
            llm_failed,
        }
    }

    /// One retry after the grounding check rejected an answer, with the
    /// offending product names spelled out.
    pub async fn regenerate(
        &self,
        question: &str,
        pool: &EvidencePool,
        unmatched: &[String],
    ) -> Option<String> {
        let mut prompt = build_prompt(question, pool);
        prompt.push_str(&format!(
            "\n\nLưu ý: câu trả lời trước đã nhắc đến sản phẩm không có trong \
             thông tin được cung cấp: {}. Chỉ được nói về các sản phẩm có trong \
             thông tin trên.",
            unmatched.join(", ")
        ));

        match self.llm.complete(&self.request(prompt)).await {
            Ok(raw) => Some(with_degraded_notice(
                strip_id_lines(raw.trim()),
                pool.degraded,
            )),
            Err(error) => {
                warn!(%error, "consultation regeneration failed");
                None
            }
        }
    }

    /// Same evidence build as [`answer`](Self::answer), tokens streamed
    /// straight from the model. Grounding validation does not run on
    /// streamed answers.
    pub async fn answer_stream(&self, question: &str) -> ConsultationStream {
        let pool = self.aggregator.search(question, self.top_k).await;
        if pool.is_empty() {
            return ConsultationStream {
                stream: fixed_chunk(NO_INFORMATION.to_string()),
                pool,
                llm_failed: false,
            };
        }

        let request = self.request(build_prompt(question, &pool));
        let (stream, llm_failed) = match self.llm.complete_stream(&request).await {
            Ok(stream) => (stream, false),
            Err(error) => {
                warn!(%error, "consultation stream failed to open");
                (fixed_chunk(NO_INFORMATION.to_string()), true)
            }
        };

        let stream = if pool.degraded {
            prepend_chunk(format!("{}\n\n", DEGRADED_NOTICE), stream)
        } else {
            stream
        };

        ConsultationStream {
            stream,
            pool,
            llm_failed,
        }
    }

    fn request(&self, prompt: String) -> CompletionRequest {
        CompletionRequest::new(prompt, self.max_tokens, self.temperature)
    }
}

// =============================================================================
// Prompt assembly
// =============================================================================

fn build_prompt(question: &str, pool: &EvidencePool) -> String {
    format!(
        "{}\n\nBối cảnh:\n{}\n\nKhách hỏi: {}",
        SYSTEM_PROMPT,
        build_context(pool),
        question
    )
}

/// Evidence sections shown to the model, identifiers already stripped.
fn build_context(pool: &EvidencePool) -> String {
    let presentable = pool.presentable();
    let internal: Vec<&SearchResult> = presentable
        .iter()
        .filter(|r| r.source == SourceType::Internal)
        .collect();
    let external: Vec<&SearchResult> = presentable
        .iter()
        .filter(|r| r.source == SourceType::External)
        .collect();

    let mut sections = Vec::new();
    if !internal.is_empty() {
        let block = internal
            .iter()
            .enumerate()
            .map(|(i, r)| format!("Sản phẩm {}: {}\n{}", i + 1, r.title, r.snippet))
            .collect::<Vec<_>>()
            .join("\n\n");
        sections.push(format!("=== THÔNG TIN TỪ CỬA HÀNG ===\n{}", block));
    }
    if !external.is_empty() {
        let block = external
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let url = r.metadata.get("url").and_then(|v| v.as_str()).unwrap_or("");
                format!("Kết quả {}: {}\n{}\nNguồn: {}", i + 1, r.title, r.snippet, url)
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        sections.push(format!(
            "=== THÔNG TIN THAM KHẢO TỪ WEB ===\nCác sản phẩm dưới đây cửa hàng \
             không kinh doanh, chỉ dùng để tham khảo.\n{}",
            block
        ));
    }
    sections.join("\n\n")
}

fn with_degraded_notice(text: String, degraded: bool) -> String {
    if degraded {
        format!("{}\n\n{}", DEGRADED_NOTICE, text)
    } else {
        text
    }
}

fn fixed_chunk(text: String) -> TokenStream {
    Box::pin(tokio_stream::once(Ok(text)))
}

fn prepend_chunk(chunk: String, stream: TokenStream) -> TokenStream {
    use tokio_stream::StreamExt;
    Box::pin(tokio_stream::once(Ok(chunk)).chain(stream))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;
    use uuid::Uuid;

    use hawker_core::config::WebSearchConfig;
    use hawker_core::types::Product;
    use hawker_llm::{LlmError, MockLlm};
    use hawker_search::{
        DynEmbeddingService, EmbeddingService, HashEmbedding, MockWebSearch, ProductIndex,
        SearchError, WebHit, WebSearchProvider,
    };

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

    fn search_config() -> SearchConfig {
        SearchConfig {
            min_internal_results: 1,
            min_relevance: -1.0,
            embedding_dim: 64,
            ..SearchConfig::default()
        }
    }

    fn handler(
        embedding: Arc<dyn DynEmbeddingService>,
        index: ProductIndex,
        web: Option<Arc<dyn WebSearchProvider>>,
        llm: Arc<MockLlm>,
    ) -> ConsultationHandler {
        let aggregator = SearchAggregator::new(
            embedding,
            index,
            web,
            &search_config(),
            &WebSearchConfig::default(),
        );
        ConsultationHandler::new(aggregator, llm, &search_config(), &LlmConfig::default())
    }

    async fn collect(mut stream: TokenStream) -> String {
        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            out.push_str(&chunk.unwrap());
        }
        out
    }

    // ---- Answer generation ----

    #[tokio::test]
    async fn test_empty_pool_skips_the_model() {
        let llm = Arc::new(MockLlm::new());
        let h = handler(
            Arc::new(HashEmbedding::new(64)),
            ProductIndex::new(),
            None,
            llm.clone(),
        );

        let outcome = h.answer("iPhone 15 giá bao nhiêu?").await;
        assert_eq!(outcome.text, NO_INFORMATION);
        assert!(!outcome.llm_failed);
        assert!(outcome.pool.is_empty());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_answer_is_built_from_catalog_evidence() {
        let embedding = Arc::new(HashEmbedding::new(64));
        let index = ProductIndex::new();
        seed(&index, &embedding, "iPhone 15", "Apple").await;

        let llm = Arc::new(MockLlm::new());
        llm.push_ok("iPhone 15 có giá 24.990.000đ, RAM 8GB ạ.");
        let h = handler(embedding, index, None, llm.clone());

        let outcome = h.answer("iPhone 15").await;
        assert_eq!(outcome.text, "iPhone 15 có giá 24.990.000đ, RAM 8GB ạ.");
        assert!(!outcome.llm_failed);
        assert!(!outcome.pool.is_empty());

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("=== THÔNG TIN TỪ CỬA HÀNG ==="));
        assert!(prompt.contains("Sản phẩm 1: iPhone 15"));
        assert!(prompt.contains("Khách hỏi: iPhone 15"));
    }

    #[tokio::test]
    async fn test_model_failure_degrades_to_fixed_reply() {
        let embedding = Arc::new(HashEmbedding::new(64));
        let index = ProductIndex::new();
        seed(&index, &embedding, "iPhone 15", "Apple").await;

        let llm = Arc::new(MockLlm::new());
        llm.push_err(LlmError::Timeout);
        let h = handler(embedding, index, None, llm);

        let outcome = h.answer("iPhone 15").await;
        assert_eq!(outcome.text, NO_INFORMATION);
        assert!(outcome.llm_failed);
    }

    #[tokio::test]
    async fn test_id_lines_are_stripped_from_model_output() {
        let embedding = Arc::new(HashEmbedding::new(64));
        let index = ProductIndex::new();
        seed(&index, &embedding, "iPhone 15", "Apple").await;

        let llm = Arc::new(MockLlm::new());
        llm.push_ok("id: 42\niPhone 15 có giá 24.990.000đ ạ.");
        let h = handler(embedding, index, None, llm);

        let outcome = h.answer("iPhone 15").await;
        assert_eq!(outcome.text, "iPhone 15 có giá 24.990.000đ ạ.");
    }

    #[tokio::test]
    async fn test_degraded_pool_prepends_notice() {
        let web = Arc::new(MockWebSearch::new());
        web.push_hits(vec![WebHit {
            title: "Đánh giá iPhone 15".to_string(),
            snippet: "pin tốt, camera nét".to_string(),
            url: "https://tinhte.vn/iphone-15".to_string(),
        }]);

        let llm = Arc::new(MockLlm::new());
        llm.push_ok("Theo tinhte.vn, iPhone 15 có pin tốt.");
        let h = handler(Arc::new(FailingEmbedding), ProductIndex::new(), Some(web), llm);

        let outcome = h.answer("iPhone 15 pin thế nào?").await;
        assert!(outcome.pool.degraded);
        assert!(outcome.text.starts_with(DEGRADED_NOTICE));
        assert!(outcome.text.contains("Theo tinhte.vn"));
    }

    #[tokio::test]
    async fn test_web_section_carries_disclaimer_and_source() {
        let web = Arc::new(MockWebSearch::new());
        web.push_hits(vec![WebHit {
            title: "Google Pixel 8".to_string(),
            snippet: "camera hàng đầu".to_string(),
            url: "https://example.com/pixel-8".to_string(),
        }]);

        let llm = Arc::new(MockLlm::new());
        llm.push_ok("Pixel 8 có camera hàng đầu (nguồn: example.com).");
        let h = handler(Arc::new(HashEmbedding::new(64)), ProductIndex::new(), Some(web), llm.clone());

        h.answer("Pixel 8 thế nào?").await;

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("=== THÔNG TIN THAM KHẢO TỪ WEB ==="));
        assert!(prompt.contains("không kinh doanh"));
        assert!(prompt.contains("Nguồn: https://example.com/pixel-8"));
    }

    // ---- Regeneration ----

    #[tokio::test]
    async fn test_regenerate_names_the_mismatch() {
        let embedding = Arc::new(HashEmbedding::new(64));
        let index = ProductIndex::new();
        seed(&index, &embedding, "iPhone 15", "Apple").await;

        let llm = Arc::new(MockLlm::new());
        llm.push_ok("Dạ em chỉ có thông tin về iPhone 15 ạ.");
        let h = handler(embedding, index, None, llm.clone());

        let pool = EvidencePool {
            results: vec![],
            degraded: false,
            used_web: false,
        };
        let retry = h
            .regenerate("iPhone 15", &pool, &["iPhone 14".to_string()])
            .await;
        assert_eq!(retry.as_deref(), Some("Dạ em chỉ có thông tin về iPhone 15 ạ."));

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("Lưu ý"));
        assert!(prompt.contains("iPhone 14"));
    }

    #[tokio::test]
    async fn test_regenerate_failure_returns_none() {
        let llm = Arc::new(MockLlm::new());
        llm.push_err(LlmError::Unavailable("down".to_string()));
        let h = handler(
            Arc::new(HashEmbedding::new(64)),
            ProductIndex::new(),
            None,
            llm,
        );

        let pool = EvidencePool {
            results: vec![],
            degraded: false,
            used_web: false,
        };
        assert!(h.regenerate("iPhone 15", &pool, &[]).await.is_none());
    }

    // ---- Streaming ----

    #[tokio::test]
    async fn test_stream_tokens_reassemble_the_answer() {
        let embedding = Arc::new(HashEmbedding::new(64));
        let index = ProductIndex::new();
        seed(&index, &embedding, "iPhone 15", "Apple").await;

        let llm = Arc::new(MockLlm::new());
        llm.push_ok("iPhone 15 rất đáng mua ạ.");
        let h = handler(embedding, index, None, llm);

        let result = h.answer_stream("iPhone 15").await;
        assert!(!result.llm_failed);
        assert_eq!(collect(result.stream).await, "iPhone 15 rất đáng mua ạ.");
    }

    #[tokio::test]
    async fn test_stream_with_empty_pool_is_one_fixed_chunk() {
        let llm = Arc::new(MockLlm::new());
        let h = handler(
            Arc::new(HashEmbedding::new(64)),
            ProductIndex::new(),
            None,
            llm.clone(),
        );

        let result = h.answer_stream("có mẫu nào mới không?").await;
        assert_eq!(collect(result.stream).await, NO_INFORMATION);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_degraded_stream_leads_with_the_notice() {
        let web = Arc::new(MockWebSearch::new());
        web.push_hits(vec![WebHit {
            title: "Đánh giá iPhone 15".to_string(),
            snippet: "pin tốt".to_string(),
            url: "https://example.com/danh-gia".to_string(),
        }]);

        let llm = Arc::new(MockLlm::new());
        llm.push_ok("Pin iPhone 15 dùng được cả ngày.");
        let h = handler(Arc::new(FailingEmbedding), ProductIndex::new(), Some(web), llm);

        let result = h.answer_stream("iPhone 15 pin thế nào?").await;
        assert!(result.pool.degraded);
        let text = collect(result.stream).await;
        assert!(text.starts_with(DEGRADED_NOTICE));
        assert!(text.ends_with("cả ngày."));
    }
}
