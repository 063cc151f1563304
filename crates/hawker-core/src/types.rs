use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Author of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The customer.
    User,
    /// The engine.
    Assistant,
}

/// Final label produced by intent classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentLabel {
    /// Product questions, comparisons, advice. The safe default.
    Consultation,
    /// The customer wants to buy something.
    Order,
}

impl IntentLabel {
    /// Uppercase wire form used in model prompts and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLabel::Consultation => "CONSULTATION",
            IntentLabel::Order => "ORDER",
        }
    }
}

/// Origin of a search result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Shop catalog. Purchasable.
    Internal,
    /// Web augmentation. Reference only, never purchasable.
    External,
}

/// Lifecycle stage of an order conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStage {
    /// Order intent detected, nothing collected yet.
    Initiated,
    /// Waiting for the customer to name a catalog product.
    AwaitingProduct,
    /// Product pinned, waiting for contact details.
    AwaitingContact,
    /// Order placed. Terminal.
    Confirmed,
    /// Abandoned or cancelled. Terminal.
    Cancelled,
}

impl OrderStage {
    /// Terminal stages accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStage::Confirmed | OrderStage::Cancelled)
    }
}

impl fmt::Display for OrderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStage::Initiated => write!(f, "initiated"),
            OrderStage::AwaitingProduct => write!(f, "awaiting_product"),
            OrderStage::AwaitingContact => write!(f, "awaiting_contact"),
            OrderStage::Confirmed => write!(f, "confirmed"),
            OrderStage::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Contact detail captured during an order. Either form completes the flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactInfo {
    /// Vietnamese phone number, normalized digits.
    Phone(String),
    /// Free-form delivery address.
    Address(String),
}

impl ContactInfo {
    pub fn value(&self) -> &str {
        match self {
            ContactInfo::Phone(v) => v,
            ContactInfo::Address(v) => v,
        }
    }
}

// =============================================================================
// Conversation
// =============================================================================

/// A single conversation message. Constructed once, never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Bounded message history for one conversation, oldest first.
///
/// `push` evicts from the front once the cap is exceeded, so the window
/// always holds the most recent messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationHistory {
    messages: Vec<Message>,
    cap: usize,
}

impl ConversationHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            messages: Vec::new(),
            cap,
        }
    }

    /// Append a message, evicting the oldest beyond the cap.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        while self.messages.len() > self.cap {
            self.messages.remove(0);
        }
    }

    /// The most recent `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

// =============================================================================
// Intent
// =============================================================================

/// Outcome of intent classification for one user message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub label: IntentLabel,
    /// Confidence in the label. Range: 0.0 to 1.0.
    pub confidence: f64,
    /// Raw rule-engine score before any model involvement. Usually under
    /// 100 but stacked triggers can push past it.
    pub rule_score: u32,
    /// Whether the language model contributed to the decision.
    pub model_used: bool,
    /// Short human-readable account of how the label was reached.
    pub rationale: String,
}

// =============================================================================
// Search
// =============================================================================

/// One entry in the evidence pool assembled for a reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub source: SourceType,
    /// Catalog reference. `Some` only for internal results.
    pub product_id: Option<Uuid>,
    /// Display name of the product or page.
    pub title: String,
    /// Short descriptive text shown to the model and the customer.
    pub snippet: String,
    /// Relevance score. Range: 0.0 to 1.0, comparable across sources.
    pub score: f64,
    /// Source-specific extras: price, brand, url.
    pub metadata: serde_json::Value,
}

/// A catalog product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub brand: String,
    /// Price in Vietnamese dong.
    pub price: i64,
    /// Ordered key/value spec sheet (ram, storage, screen, ...).
    pub attributes: Vec<(String, String)>,
}

impl Product {
    /// Case-insensitive attribute lookup.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

// =============================================================================
// Order
// =============================================================================

/// Mutable order progress attached to a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderState {
    pub stage: OrderStage,
    pub product: Option<Product>,
    pub contact: Option<ContactInfo>,
    /// Assigned only when the order reaches `Confirmed`.
    pub order_id: Option<Uuid>,
    /// Consecutive turns without a stage advance. Drives abandonment.
    pub stale_turns: u32,
    pub updated_at: DateTime<Utc>,
}

impl OrderState {
    pub fn new() -> Self {
        Self {
            stage: OrderStage::Initiated,
            product: None,
            contact: None,
            order_id: None,
            stale_turns: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

impl Default for OrderState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
