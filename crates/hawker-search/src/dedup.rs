//! Near-duplicate removal and brand diversity over a candidate pool.
//!
//! Duplicates come in two forms: the same product listed twice under
//! trivially different names, and the same product named identically by the
//! catalog and the web. Both are caught by a spec signature (brand, model
//! tokens, ram, storage) plus a name-similarity test. The pool arrives
//! sorted by descending score, so the kept member of any duplicate group is
//! always the higher-scored one.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use hawker_core::text::similarity_ratio;
use hawker_core::types::{SearchResult, SourceType};

/// Brand aliases, checked in order. The first alias found in a name maps it
/// to the canonical brand.
const BRAND_PATTERNS: &[(&str, &[&str])] = &[
    ("realme", &["realme", "real me"]),
    ("samsung", &["samsung", "galaxy"]),
    ("xiaomi", &["xiaomi", "redmi", "poco", "mi "]),
    ("oppo", &["oppo"]),
    ("vivo", &["vivo", "iqoo"]),
    ("iphone", &["iphone", "apple"]),
    ("oneplus", &["oneplus", "one plus"]),
    ("huawei", &["huawei", "honor"]),
    ("nokia", &["nokia"]),
    ("sony", &["sony"]),
    ("lg", &["lg"]),
    ("motorola", &["motorola", "moto"]),
];

/// Generic words that carry no model information.
const FILLER_WORDS: &[&str] = &["điện thoại", "smartphone", "phone", "mobile"];

const RAM_KEYWORDS: &[&str] = &["ram:", "ram", "bộ nhớ trong:"];
const STORAGE_KEYWORDS: &[&str] = &["dung lượng lưu trữ:", "storage", "gb", "tb"];

static RAM_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| spec_patterns(RAM_KEYWORDS));
static STORAGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| spec_patterns(STORAGE_KEYWORDS));

fn spec_patterns(keywords: &[&str]) -> Vec<Regex> {
    keywords
        .iter()
        .map(|kw| {
            Regex::new(&format!(
                r"{}\s*:?\s*([0-9]+(?:\s*gb|tb)?)",
                regex::escape(kw)
            ))
            .expect("Invalid spec regex")
        })
        .collect()
}

/// Removes near-duplicate results and caps results per brand.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    /// Name similarity at or above which two results are the same product.
    threshold: f64,
    /// Survivors allowed per brand.
    max_per_brand: usize,
}

impl Deduplicator {
    pub fn new(threshold: f64, max_per_brand: usize) -> Self {
        Self {
            threshold,
            max_per_brand,
        }
    }

    /// Full pruning pass: sort by score, drop duplicates, enforce brand
    /// diversity. Idempotent.
    pub fn apply(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        self.diversify(self.dedup(results))
    }

    /// Remove duplicates, keeping the higher-scored member of each group.
    ///
    /// A result is a duplicate when its spec signature exactly matches a
    /// kept result's, or its name similarity against any kept result
    /// reaches the threshold. Results without a title are dropped.
    pub fn dedup(&self, mut results: Vec<SearchResult>) -> Vec<SearchResult> {
        sort_by_score(&mut results);

        let mut kept: Vec<SearchResult> = Vec::with_capacity(results.len());
        let mut seen_signatures: HashSet<String> = HashSet::new();
        let mut kept_names: Vec<String> = Vec::new();

        for result in results {
            if result.title.is_empty() {
                continue;
            }

            let signature = product_signature(&result.title, &result.snippet);
            if seen_signatures.contains(&signature) {
                continue;
            }

            let name = result.title.to_lowercase();
            let duplicate = kept_names
                .iter()
                .any(|kept| similarity_ratio(&name, kept) >= self.threshold);
            if duplicate {
                continue;
            }

            seen_signatures.insert(signature);
            kept_names.push(name);
            kept.push(result);
        }

        kept
    }

    /// Cap survivors per brand, dropping the lowest-scored excess.
    pub fn diversify(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        let mut diversified = Vec::with_capacity(results.len());

        for result in results {
            if result.title.is_empty() {
                continue;
            }
            let brand = brand_of(&result.title);
            let count = counts.entry(brand).or_insert(0);
            if *count < self.max_per_brand {
                *count += 1;
                diversified.push(result);
            }
        }

        diversified
    }
}

/// Descending score; internal results first on equal scores so the catalog
/// copy of a product survives dedup against its web mirror.
fn sort_by_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| source_rank(a.source).cmp(&source_rank(b.source)))
    });
}

fn source_rank(source: SourceType) -> u8 {
    match source {
        SourceType::Internal => 0,
        SourceType::External => 1,
    }
}

/// Canonical brand of a product name, falling back to its first word.
pub fn brand_of(name: &str) -> String {
    let name = name.to_lowercase();
    for (brand, variants) in BRAND_PATTERNS {
        if variants.iter().any(|v| name.contains(v)) {
            return (*brand).to_string();
        }
    }
    name.split_whitespace()
        .next()
        .unwrap_or("unknown")
        .to_string()
}

/// Spec signature: `model-tokens_ram_storage`, e.g. `iphone_15_8gb_256gb`.
///
/// Falls back to the brand-normalized name when nothing else is extractable.
pub fn product_signature(name: &str, content: &str) -> String {
    let normalized = normalize_brand_name(name);

    let mut parts: Vec<String> = Vec::new();

    let model = model_tokens(&normalized);
    if !model.is_empty() {
        parts.push(model);
    }
    if let Some(ram) = extract_spec(content, &RAM_PATTERNS) {
        parts.push(normalize_spec(&ram));
    }
    if let Some(storage) = extract_spec(content, &STORAGE_PATTERNS) {
        parts.push(normalize_spec(&storage));
    }

    if parts.is_empty() {
        normalized
    } else {
        parts.join("_")
    }
}

/// Replace every occurrence of a brand alias with the canonical brand.
fn normalize_brand_name(name: &str) -> String {
    let mut name = name.to_lowercase();
    for (brand, variants) in BRAND_PATTERNS {
        for variant in *variants {
            if name.contains(variant) {
                name = name.replace(variant, brand);
                break;
            }
        }
    }
    name.trim().to_string()
}

/// First three significant tokens of the normalized name, joined with `_`.
fn model_tokens(normalized_name: &str) -> String {
    let mut cleaned = normalized_name.to_string();
    for filler in FILLER_WORDS {
        cleaned = cleaned.replace(filler, " ");
    }
    cleaned
        .split_whitespace()
        .filter(|part| part.chars().count() > 1)
        .take(3)
        .collect::<Vec<_>>()
        .join("_")
}

fn extract_spec(content: &str, patterns: &[Regex]) -> Option<String> {
    let content = content.to_lowercase();
    for pattern in patterns {
        if let Some(caps) = pattern.captures(&content) {
            return Some(caps[1].trim().to_string());
        }
    }
    None
}

/// `"8 GB"` and `"8gb"` both read as `"8gb"`.
fn normalize_spec(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("{}gb", digits)
}
