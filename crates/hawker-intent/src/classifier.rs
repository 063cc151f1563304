//! Hybrid rule/model intent classification.
//!
//! The rule scorer decides on its own when the score lands clearly on one
//! side of the order threshold. Inside the uncertainty band the language
//! model is consulted, with bounded retries, and its opinion is blended with
//! the rule evidence. Every failure path degrades to consultation; a
//! classification call never surfaces an error to the caller.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use hawker_core::config::{IntentConfig, LlmConfig};
use hawker_core::types::{IntentLabel, IntentResult, Message, Role};
use hawker_llm::{CompletionRequest, LlmClient, LlmError};

use crate::rules::{RuleScorer, RuleSignal};

/// Confidence reported when the model never produced a usable opinion.
const DEGRADED_CONFIDENCE: f64 = 0.3;

/// Characters of each history reply carried into the model prompt.
const HISTORY_SNIPPET_CHARS: usize = 100;

/// Minimum usable completion length. Anything shorter is noise.
const MIN_COMPLETION_CHARS: usize = 10;

const INTENT_PROMPT_HEADER: &str = "\
Bạn là chuyên gia phân tích ý định khách hàng trong bán hàng điện tử.

NHIỆM VỤ: Phân tích xem khách hàng có ý định ĐẶT HÀNG hay chỉ TƯ VẤN.

CÁC DẤU HIỆU ĐẶT HÀNG:
- Từ khóa rõ ràng: \"đặt hàng\", \"mua\", \"order\"
- Hỏi tồn kho: \"còn hàng không\", \"có hàng không\"
- Hỏi giá khi đã biết sản phẩm cụ thể
- Tham chiếu đến sản phẩm đã thảo luận: \"cái này\", \"điện thoại trên\"
- Hỏi lại về cùng sản phẩm nhiều lần

CÁC DẤU HIỆU TƯ VẤN:
- Hỏi so sánh chung: \"điện thoại nào tốt\"
- Xin tư vấn: \"nên chọn gì\", \"gợi ý\"
- Hỏi thông số kỹ thuật tổng quát
- Chưa có sản phẩm cụ thể trong đầu";

/// Classifies one message per turn, degrading to consultation when in doubt.
pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
    rules: RuleScorer,
    order_threshold: u32,
    uncertainty_band: u32,
    history_turns: usize,
    max_retries: u32,
    retry_backoff: Duration,
    temperature: f64,
    max_tokens: u32,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, intent: &IntentConfig, llm_config: &LlmConfig) -> Self {
        Self {
            llm,
            rules: RuleScorer::new(intent.history_turns),
            order_threshold: intent.order_threshold,
            uncertainty_band: intent.uncertainty_band,
            history_turns: intent.history_turns,
            max_retries: llm_config.max_retries,
            retry_backoff: Duration::from_millis(llm_config.retry_backoff_ms),
            temperature: llm_config.intent_temperature,
            max_tokens: llm_config.max_tokens,
        }
    }

    /// Classify the message in its conversation context. Infallible: model
    /// trouble lowers confidence, it never propagates.
    pub async fn classify(&self, message: &str, history: &[Message]) -> IntentResult {
        let signal = self.rules.score(message, history);
        let rule_confidence = (signal.score as f64 / 100.0).min(1.0);

        let lower = self.order_threshold.saturating_sub(self.uncertainty_band);
        let upper = self.order_threshold + self.uncertainty_band;
        let uncertain = signal.score >= lower && signal.score <= upper;

        if !uncertain {
            let (label, confidence) = if signal.score >= self.order_threshold {
                (IntentLabel::Order, rule_confidence)
            } else {
                (
                    IntentLabel::Consultation,
                    (1.0 - rule_confidence).clamp(0.0, 1.0),
                )
            };
            let result = IntentResult {
                label,
                confidence,
                rule_score: signal.score,
                model_used: false,
                rationale: format!("rule_fast_path: score {}", signal.score),
            };
            return self.apply_order_guard(result, &signal);
        }

        match self.model_opinion(message, history).await {
            Some(opinion) => {
                let blended = if opinion.label == IntentLabel::Order {
                    rule_confidence * 0.4 + opinion.confidence * 0.6
                } else {
                    rule_confidence * 0.6 + opinion.confidence * 0.4
                };
                let rule_label = if signal.score >= self.order_threshold {
                    IntentLabel::Order
                } else {
                    IntentLabel::Consultation
                };

                let (label, method) = if rule_label == opinion.label {
                    (opinion.label, "rule_llm_agreement")
                } else if opinion.confidence >= 0.5 {
                    (opinion.label, "llm_primary_decision")
                } else {
                    (IntentLabel::Consultation, "llm_low_confidence_fallback")
                };

                let result = IntentResult {
                    label,
                    confidence: blended.clamp(0.0, 1.0),
                    rule_score: signal.score,
                    model_used: true,
                    rationale: method.to_string(),
                };
                self.apply_order_guard(result, &signal)
            }
            None => IntentResult {
                label: IntentLabel::Consultation,
                confidence: DEGRADED_CONFIDENCE,
                rule_score: signal.score,
                model_used: false,
                rationale: "model_unavailable: defaulting to consultation".to_string(),
            },
        }
    }

    /// ORDER requires either an explicit purchase phrase or a deciding
    /// confidence of at least 0.5. Anything weaker is demoted.
    fn apply_order_guard(&self, mut result: IntentResult, signal: &RuleSignal) -> IntentResult {
        if result.label == IntentLabel::Order && !signal.explicit_order && result.confidence < 0.5 {
            result.label = IntentLabel::Consultation;
            result.rationale = format!("{}; order_guard_demotion", result.rationale);
        }
        result
    }

    /// One model consultation with bounded retries. `None` means every
    /// attempt failed or returned junk.
    async fn model_opinion(&self, message: &str, history: &[Message]) -> Option<ModelOpinion> {
        let prompt = self.build_prompt(message, history);
        let request = CompletionRequest::new(prompt, self.max_tokens, self.temperature);

        let mut attempt = 0u32;
        loop {
            let error = match self.llm.complete(&request).await {
                Ok(text) => {
                    if text.trim().chars().count() < MIN_COMPLETION_CHARS {
                        LlmError::Malformed("completion shorter than 10 chars".to_string())
                    } else if let Some(opinion) = parse_opinion(&text) {
                        return Some(opinion);
                    } else {
                        LlmError::Malformed("no JSON object in completion".to_string())
                    }
                }
                Err(e) => e,
            };

            if attempt >= self.max_retries || !error.is_transient() {
                warn!(attempts = attempt + 1, error = %error, "intent model analysis failed");
                return None;
            }
            attempt += 1;
            debug!(attempt, error = %error, "retrying intent model analysis");
            tokio::time::sleep(self.retry_backoff).await;
        }
    }

    fn build_prompt(&self, message: &str, history: &[Message]) -> String {
        format!(
            "{}\n\nNGỮ CẢNH:\nTin nhắn hiện tại: {}\nLịch sử cuộc trò chuyện:\n{}\n\n\
             Trả lời JSON:\n{{\n    \"intent\": \"ORDER\" hoặc \"CONSULTATION\",\n    \
             \"confidence\": 0.0-1.0,\n    \"reasoning\": \"giải thích ngắn gọn\"\n}}",
            INTENT_PROMPT_HEADER,
            message,
            format_history(history, self.history_turns),
        )
    }
}

/// Recent turns as "Khách:"/"Bot:" lines. Bot replies are clipped so one
/// verbose answer cannot crowd out the rest of the window.
fn format_history(history: &[Message], turns: usize) -> String {
    if history.is_empty() {
        return "Không có lịch sử cuộc trò chuyện".to_string();
    }
    let start = history.len().saturating_sub(turns * 2);
    history[start..]
        .iter()
        .map(|m| match m.role {
            Role::User => format!("Khách: {}", m.text),
            Role::Assistant => format!("Bot: {}", clip(&m.text, HISTORY_SNIPPET_CHARS)),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let clipped: String = text.chars().take(max_chars).collect();
        format!("{}...", clipped)
    }
}

struct ModelOpinion {
    label: IntentLabel,
    confidence: f64,
}

/// Pull the JSON object out of a completion that may wrap it in prose or a
/// Markdown fence, then read the fields leniently.
fn parse_opinion(text: &str) -> Option<ModelOpinion> {
    let json = extract_json(text)?;
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    let label = match value.get("intent").and_then(|v| v.as_str()) {
        Some("ORDER") => IntentLabel::Order,
        _ => IntentLabel::Consultation,
    };
    let confidence = value
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.5)
        .clamp(0.0, 1.0);
    Some(ModelOpinion { label, confidence })
}

fn extract_json(text: &str) -> Option<&str> {
    if let Some(fence) = text.find("```json") {
        let rest = &text[fence + 7..];
        let end = rest.find("```")?;
        return Some(rest[..end].trim());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
