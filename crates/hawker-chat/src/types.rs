//! Response envelope and counters for the dialogue engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hawker_core::types::{IntentLabel, OrderStage, OrderState, SearchResult, SourceType};

// =============================================================================
// SourceAttribution
// =============================================================================

/// Provenance of one piece of evidence behind an answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub source: SourceType,
    /// Product name or page title.
    pub title: String,
    /// Page URL for web hits. Catalog entries carry none.
    pub url: Option<String>,
}

impl SourceAttribution {
    /// Attributions for a ranked evidence pool, order preserved.
    pub fn from_results(results: &[SearchResult]) -> Vec<SourceAttribution> {
        results
            .iter()
            .map(|r| SourceAttribution {
                source: r.source,
                title: r.title.clone(),
                url: r
                    .metadata
                    .get("url")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            })
            .collect()
    }
}

// =============================================================================
// OrderSnapshot
// =============================================================================

/// Order progress as exposed to API clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub stage: OrderStage,
    /// Name of the pinned product, once one is identified.
    pub product: Option<String>,
    /// Assigned when the order reaches `Confirmed`.
    pub order_id: Option<Uuid>,
}

impl From<&OrderState> for OrderSnapshot {
    fn from(state: &OrderState) -> Self {
        OrderSnapshot {
            stage: state.stage,
            product: state.product.as_ref().map(|p| p.name.clone()),
            order_id: state.order_id,
        }
    }
}

// =============================================================================
// EngineResponse
// =============================================================================

/// Everything produced by one conversational turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineResponse {
    /// Final customer-facing text.
    pub text: String,
    pub intent: IntentLabel,
    /// Classifier confidence in the label. Range: 0.0 to 1.0.
    pub confidence: f64,
    /// Evidence behind a consultation answer. Empty for order turns.
    pub sources: Vec<SourceAttribution>,
    /// Present once the conversation has touched the order flow.
    pub order: Option<OrderSnapshot>,
    /// True when a backend failure forced a less authoritative reply.
    pub degraded: bool,
}

// =============================================================================
// EngineStats
// =============================================================================

/// Running counters across all conversations. Snapshot via
/// [`DialogueOrchestrator::stats`](crate::DialogueOrchestrator::stats).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Turns handled, rejected input excluded.
    pub messages: u64,
    /// Turns labelled consultation by the classifier.
    pub consultation_turns: u64,
    /// Turns labelled order by the classifier.
    pub order_turns: u64,
    /// Classifier fell back to the conservative default after model failure.
    pub llm_fallbacks: u64,
    /// Answers the validator refused, retries counted separately.
    pub validator_rejections: u64,
    /// Turns whose evidence pool included web results.
    pub web_searches: u64,
}
