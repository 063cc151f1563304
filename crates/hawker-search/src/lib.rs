//! Product retrieval and evidence aggregation.
//!
//! Two sources feed one pool: the in-memory product index (embedding
//! similarity over the catalog) and an optional web search backend. The
//! aggregator merges them by score, removes near-duplicate products, caps
//! how many results one brand may occupy, and strips internal identifiers
//! from everything headed to answer generation.

pub mod aggregator;
pub mod dedup;
pub mod embedding;
pub mod error;
pub mod index;
pub mod web;

pub use aggregator::{EvidencePool, SearchAggregator};
pub use dedup::Deduplicator;
pub use embedding::{DynEmbeddingService, EmbeddingService, HashEmbedding};
pub use error::SearchError;
pub use index::ProductIndex;
pub use web::{HttpWebSearch, MockWebSearch, WebHit, WebSearchProvider};
