//! Intent classification for Hawker.
//!
//! A weighted keyword scorer decides the clear cases on its own; only
//! messages landing near the order threshold are escalated to the language
//! model, and every degraded path falls back to consultation.

pub mod classifier;
pub mod rules;

pub use classifier::IntentClassifier;
pub use rules::{
    extract_product_mention, is_comparison_query, RuleScorer, RuleSignal,
};
