//! Weighted keyword scoring for purchase intent.
//!
//! Several independent triggers contribute points; the sum is compared
//! against the configured order threshold. Matching runs over normalized
//! text with word-ish boundaries so short Vietnamese tokens do not fire
//! inside longer words ("mi" must not match "miễn phí").

use hawker_core::text::normalize;
use hawker_core::types::Message;

// =============================================================================
// Keyword tables
// =============================================================================

/// Explicit purchase phrases. Any hit is the strongest single signal.
const EXPLICIT_ORDER_KEYWORDS: &[&str] = &[
    "đặt hàng",
    "mua",
    "order",
    "đặt",
    "mình muốn mua",
    "cho tôi đặt",
    "tôi cần mua",
    "em muốn đặt",
    "book",
    "mình đặt",
    "đặt mua",
    "order ngay",
    "mua ngay",
    "tôi muốn đặt",
    "tôi muốn mua",
    "muốn đặt hàng",
    "muốn mua",
];

/// Stock and availability questions.
const STOCK_KEYWORDS: &[&str] = &[
    "còn hàng",
    "có hàng",
    "còn không",
    "hết hàng",
    "tình trạng hàng",
    "stock",
    "available",
    "availability",
];

/// Price questions, from direct to vague.
const PRICE_KEYWORDS: &[&str] = &[
    "giá",
    "price",
    "cost",
    "tiền",
    "bao nhiêu",
    "giá cả",
    "giá bán",
    "phí",
    "chi phí",
];

/// Brand tokens recognized in messages and history.
const PRODUCT_BRANDS: &[&str] = &[
    "iphone", "samsung", "galaxy", "xiaomi", "oppo", "vivo", "realme", "oneplus",
    "huawei", "nokia", "sony", "lg", "asus", "acer", "dell", "hp", "lenovo",
    "macbook", "ipad", "redmi", "mi", "poco",
];

/// Anaphoric phrases pointing back at an earlier product.
const REFERENCE_PATTERNS: &[&str] = &[
    "điện thoại trên",
    "điện thoại đó",
    "điện thoại này",
    "sản phẩm trên",
    "sản phẩm đó",
    "sản phẩm này",
    "thiết bị trên",
    "thiết bị đó",
    "thiết bị này",
    "máy trên",
    "máy đó",
    "máy này",
    "cái này",
    "cái đó",
];

/// Informational phrasing that points away from ordering.
const COMPARISON_KEYWORDS: &[&str] = &[
    "so sánh",
    "khác nhau",
    "tốt hơn",
    "nên chọn",
    "review",
    "đánh giá",
    "vs",
    "versus",
];

// =============================================================================
// Trigger weights
// =============================================================================

const EXPLICIT_ORDER: i32 = 50;
const STOCK_INQUIRY: i32 = 40;
const PRICE_WITH_BRAND: i32 = 30;
const PRICE_WITH_CONTEXT: i32 = 25;
const PRICE_GENERIC: i32 = 10;
const PRODUCT_CONTEXT: i32 = 25;
const REPEAT_INQUIRY: i32 = 20;
const REFERENCE_TO_PRODUCT: i32 = 15;
const COMPARISON_PENALTY: i32 = 20;

// =============================================================================
// Model tables for mention extraction, most specific first
// =============================================================================

const IPHONE_MODELS: &[&str] = &[
    "15 pro max", "15 pro", "15 plus", "15", "14 pro max", "14 pro", "14 plus",
    "14", "13 pro", "13", "12 pro", "12",
];

const GALAXY_MODELS: &[&str] = &[
    "s24 ultra", "s24", "s23 ultra", "s23", "s22 ultra", "s22", "a54", "a34",
    "a15", "note",
];

const XIAOMI_MODELS: &[&str] = &[
    "14 pro", "14 ultra", "14", "13 pro", "13", "12 pro", "12", "11",
];

const OPPO_MODELS: &[&str] = &["find x7", "find x6", "reno 11", "reno 10", "a78", "a58", "a18"];

const REALME_MODELS: &[&str] = &[
    "note 60", "11 pro", "11", "12 pro", "12", "c75x", "c55", "c53",
];

// =============================================================================
// Scoring
// =============================================================================

/// Outcome of one scoring pass.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleSignal {
    /// Sum of trigger weights, floored at 0. May exceed 100 when triggers
    /// stack.
    pub score: u32,
    /// Whether an explicit purchase phrase fired. Gates the final ORDER label.
    pub explicit_order: bool,
    /// Names of the triggers that fired, in evaluation order.
    pub matched: Vec<&'static str>,
}

/// Keyword scorer over the current message plus a recent history window.
pub struct RuleScorer {
    history_turns: usize,
}

impl RuleScorer {
    /// `history_turns` counts exchanges; the window spans twice as many
    /// messages.
    pub fn new(history_turns: usize) -> Self {
        Self { history_turns }
    }

    /// Score one message against the recent conversation window.
    pub fn score(&self, message: &str, history: &[Message]) -> RuleSignal {
        let text = normalize(message);
        let window = self.window_text(history);

        let mut score: i32 = 0;
        let mut matched = Vec::new();

        let explicit_order = contains_any(&text, EXPLICIT_ORDER_KEYWORDS);
        if explicit_order {
            score += EXPLICIT_ORDER;
            matched.push("explicit_order");
        }

        let stock = contains_any(&text, STOCK_KEYWORDS);
        if stock {
            score += STOCK_INQUIRY;
            matched.push("stock_inquiry");
        }

        let price = contains_any(&text, PRICE_KEYWORDS);
        let brand_in_message = contains_any(&text, PRODUCT_BRANDS);
        let context = !window.is_empty() && contains_any(&window, PRODUCT_BRANDS);

        if price {
            if brand_in_message {
                score += PRICE_WITH_BRAND;
            } else if context {
                score += PRICE_WITH_CONTEXT;
            } else {
                score += PRICE_GENERIC;
            }
            matched.push("price_inquiry");
        }

        let reference = contains_any(&text, REFERENCE_PATTERNS);
        if context && (reference || ((stock || price) && !brand_in_message)) {
            score += PRODUCT_CONTEXT;
            matched.push("product_context");
        }

        if history.len() >= 2 {
            let repeated = PRODUCT_BRANDS
                .iter()
                .any(|brand| contains_term(&text, brand) && contains_term(&window, brand));
            if repeated {
                score += REPEAT_INQUIRY;
                matched.push("repeat_inquiry");
            }
        }

        if reference && context {
            score += REFERENCE_TO_PRODUCT;
            matched.push("reference_resolution");
        }

        if contains_any(&text, COMPARISON_KEYWORDS) {
            score -= COMPARISON_PENALTY;
            matched.push("comparison_signal");
        }

        RuleSignal {
            score: score.max(0) as u32,
            explicit_order,
            matched,
        }
    }

    /// Normalized text of the most recent window, both roles combined.
    fn window_text(&self, history: &[Message]) -> String {
        let n = self.history_turns * 2;
        let start = history.len().saturating_sub(n);
        history[start..]
            .iter()
            .map(|m| normalize(&m.text))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// =============================================================================
// Product mention extraction
// =============================================================================

/// Extract a display-ready product mention from free text, if any brand is
/// named. Model tables refine the brand to a specific device when the text
/// carries one ("iphone 15 pro max" → "iPhone 15 Pro Max").
pub fn extract_product_mention(text: &str) -> Option<String> {
    let text = normalize(text);
    PRODUCT_BRANDS
        .iter()
        .find(|brand| contains_term(&text, brand))
        .map(|brand| specific_model(&text, brand))
}

/// Whether the text reads as a comparison or review question.
pub fn is_comparison_query(text: &str) -> bool {
    contains_any(&normalize(text), COMPARISON_KEYWORDS)
}

fn specific_model(text: &str, brand: &str) -> String {
    match brand {
        "iphone" => pick_model(text, IPHONE_MODELS)
            .map(|m| format!("iPhone {}", title_case(m)))
            .unwrap_or_else(|| "iPhone".to_string()),
        "samsung" | "galaxy" => pick_model(text, GALAXY_MODELS)
            .map(|m| format!("Samsung Galaxy {}", m.to_uppercase()))
            .unwrap_or_else(|| "Samsung Galaxy".to_string()),
        "xiaomi" => pick_model(text, XIAOMI_MODELS)
            .map(|m| format!("Xiaomi {}", title_case(m)))
            .unwrap_or_else(|| "Xiaomi".to_string()),
        "oppo" => pick_model(text, OPPO_MODELS)
            .map(|m| format!("Oppo {}", m.to_uppercase()))
            .unwrap_or_else(|| "Oppo".to_string()),
        "realme" => pick_model(text, REALME_MODELS)
            .map(|m| format!("Realme {}", title_case(m)))
            .unwrap_or_else(|| "Realme".to_string()),
        other => title_case(other),
    }
}

fn pick_model(text: &str, models: &'static [&'static str]) -> Option<&'static str> {
    models.iter().find(|m| contains_term(text, m)).copied()
}

/// Capitalize the first letter of every word, where digits and punctuation
/// also end a word ("c75x" → "C75X", "15 pro max" → "15 Pro Max").
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut boundary = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if boundary {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            boundary = false;
        } else {
            out.push(c);
            boundary = true;
        }
    }
    out
}

// =============================================================================
// Matching helpers
// =============================================================================

fn contains_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| contains_term(text, term))
}

/// Substring match rejecting hits embedded in a longer alphabetic run.
/// Digit neighbors are allowed so "iphone15" still matches "iphone".
fn contains_term(text: &str, term: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = text[start..].find(term) {
        let begin = start + pos;
        let end = begin + term.len();
        let before_ok = text[..begin]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphabetic());
        let after_ok = text[end..].chars().next().map_or(true, |c| !c.is_alphabetic());
        if before_ok && after_ok {
            return true;
        }
        start = end;
        if start >= text.len() {
            break;
        }
    }
    false
}

// =============================================================================
// Tests
// =============================================================================
