//! Grounding check for generated answers.
//!
//! The model may only name products present in the evidence it was shown.
//! The classic retrieval failure is the near-miss substitute, an answer
//! about "iPhone 15 Plus" built from "iPhone 15 Pro" evidence, so product
//! mentions are compared designator by designator, not by loose string
//! distance alone.

use std::sync::LazyLock;

use regex::Regex;

use hawker_core::text::{normalize, similarity_ratio};
use hawker_search::EvidencePool;

/// Fixed reply when regeneration still fails the grounding check.
pub const NO_MATCHING_PRODUCT: &str =
    "Xin lỗi, em không tìm thấy sản phẩm phù hợp trong dữ liệu của cửa hàng để trả lời câu hỏi này.";

/// Similarity floor for mentions that carry no model designator.
const MATCH_THRESHOLD: f64 = 0.55;

/// Product mentions anchor on a brand token and may trail a short model
/// designator ("iPhone 15 Pro Max", "Samsung Galaxy S24 Ultra").
static PRODUCT_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:iPhone|Samsung|Galaxy|Xiaomi|Redmi|Oppo|Vivo|Realme|Nokia|Pixel|Huawei)\b(?:\s+(?:Galaxy|Redmi|Note|Edge|Pro|Plus|Max|Ultra|Mini|Lite|SE|FE|[A-Za-z]?\d+[A-Za-z0-9]*\+?))*",
    )
    .expect("Invalid product mention regex")
});

/// Tokens that distinguish sibling models within one product line.
const DESIGNATOR_WORDS: &[&str] = &[
    "pro", "plus", "max", "ultra", "mini", "lite", "se", "fe", "note", "edge",
];

// =============================================================================
// Verdict
// =============================================================================

/// Outcome of the grounding check.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Accepted,
    /// Product names in the answer with no backing evidence.
    Rejected { unmatched: Vec<String> },
}

// =============================================================================
// ResponseValidator
// =============================================================================

/// Checks generated answers against the evidence pool they came from.
#[derive(Clone, Debug, Default)]
pub struct ResponseValidator;

impl ResponseValidator {
    pub fn new() -> Self {
        Self
    }

    /// Verify that every product named in `answer` is backed by a pool
    /// entry. The empty answer and answers naming no products pass.
    pub fn validate(&self, answer: &str, pool: &EvidencePool) -> Verdict {
        let titles: Vec<String> = pool.results.iter().map(|r| normalize(&r.title)).collect();

        let mut unmatched: Vec<String> = Vec::new();
        for mention in PRODUCT_MENTION.find_iter(answer) {
            let mention = mention.as_str().trim();
            if grounded(mention, &titles) {
                continue;
            }
            if !unmatched.iter().any(|u| u.eq_ignore_ascii_case(mention)) {
                unmatched.push(mention.to_string());
            }
        }

        if unmatched.is_empty() {
            Verdict::Accepted
        } else {
            Verdict::Rejected { unmatched }
        }
    }
}

/// Whether one mention is covered by any evidence title.
///
/// Mentions with designator tokens must find a title of the same family
/// that carries every one of them: "iPhone 15" matches "iPhone 15 Pro Max"
/// but "iPhone 15 Pro" never matches plain "iPhone 15". Brand-only
/// mentions fall back to containment or sequence similarity.
fn grounded(mention: &str, titles: &[String]) -> bool {
    let mention = normalize(mention);
    let designators = designator_tokens(&mention);

    titles.iter().any(|title| {
        if designators.is_empty() {
            return title.contains(&mention)
                || similarity_ratio(&mention, title) >= MATCH_THRESHOLD;
        }
        let title_designators = designator_tokens(title);
        same_family(&mention, title)
            && designators.iter().all(|d| title_designators.contains(d))
    })
}

/// Model-distinguishing tokens: anything with a digit, plus the fixed
/// designator words.
fn designator_tokens(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .filter(|t| t.chars().any(|c| c.is_ascii_digit()) || DESIGNATOR_WORDS.contains(t))
        .collect()
}

/// At least one family token (brand or line name) shared with the title.
fn same_family(mention: &str, title: &str) -> bool {
    mention
        .split_whitespace()
        .filter(|t| !t.chars().any(|c| c.is_ascii_digit()) && !DESIGNATOR_WORDS.contains(t))
        .any(|t| title.split_whitespace().any(|w| w == t))
}

// =============================================================================
// Tests
// =============================================================================
