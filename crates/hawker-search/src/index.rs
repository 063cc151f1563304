//! In-memory product index with brute-force cosine similarity search.
//!
//! Correct and simple rather than clever. All operations are O(n) for
//! search, which is acceptable for a catalog of a few thousand products.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use hawker_core::text::{normalize, similarity_ratio};
use hawker_core::types::Product;

use crate::error::SearchError;

/// Name similarity at or above which `find_by_name` accepts a non-containment
/// match.
const NAME_MATCH_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone)]
struct IndexEntry {
    product: Product,
    embedding: Vec<f32>,
}

/// In-memory product index using brute-force cosine similarity.
///
/// Thread-safe via interior RwLock, cheap to clone.
#[derive(Debug, Clone)]
pub struct ProductIndex {
    entries: Arc<RwLock<HashMap<Uuid, IndexEntry>>>,
}

impl ProductIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a product with its embedding.
    ///
    /// Overwrites any existing entry with the same product id.
    pub fn insert(&self, product: Product, embedding: Vec<f32>) -> Result<(), SearchError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| SearchError::Index(format!("lock poisoned: {}", e)))?;
        entries.insert(product.id, IndexEntry { product, embedding });
        Ok(())
    }

    /// Search for the k most similar products to the query embedding.
    ///
    /// Returns (product, cosine score) pairs sorted by descending score.
    pub fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<(Product, f64)>, SearchError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| SearchError::Index(format!("lock poisoned: {}", e)))?;

        let mut scored: Vec<(Product, f64)> = entries
            .values()
            .map(|entry| {
                let score = cosine_similarity(embedding, &entry.embedding);
                (entry.product.clone(), score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored)
    }

    /// Look up a product by (possibly partial or misspelled) name.
    ///
    /// A candidate matches when the normalized names contain one another or
    /// their similarity ratio reaches 0.85. The most similar match wins.
    /// This is the existence check behind "orders only for catalog products".
    pub fn find_by_name(&self, name: &str) -> Result<Option<Product>, SearchError> {
        let query = normalize(name);
        if query.is_empty() {
            return Ok(None);
        }

        let entries = self
            .entries
            .read()
            .map_err(|e| SearchError::Index(format!("lock poisoned: {}", e)))?;

        let mut best: Option<(Product, f64)> = None;
        for entry in entries.values() {
            let candidate = normalize(&entry.product.name);
            let ratio = similarity_ratio(&query, &candidate);
            let eligible = candidate.contains(&query)
                || query.contains(&candidate)
                || ratio >= NAME_MATCH_THRESHOLD;
            if !eligible {
                continue;
            }
            match &best {
                Some((_, best_ratio)) if *best_ratio >= ratio => {}
                _ => best = Some((entry.product.clone(), ratio)),
            }
        }

        Ok(best.map(|(product, _)| product))
    }

    /// Delete an entry by product id.
    ///
    /// Returns Ok(()) regardless of whether the entry existed.
    pub fn delete(&self, id: Uuid) -> Result<(), SearchError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| SearchError::Index(format!("lock poisoned: {}", e)))?;
        entries.remove(&id);
        Ok(())
    }

    /// Number of products currently indexed.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// True if the index contains no products.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProductIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
