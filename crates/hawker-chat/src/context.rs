//! Reference resolution for follow-up messages.
//!
//! Customers rarely repeat a product name. "Điện thoại đó còn hàng không?"
//! leans on whatever was discussed last, so the resolver substitutes the
//! most recent product mention from history and downstream stages see a
//! self-contained message. When nothing resolves, the message passes
//! through untouched.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use hawker_core::config::IntentConfig;
use hawker_core::types::Message;
use hawker_intent::extract_product_mention;

/// Phrases that point back at an earlier product mention.
static REFERENCE_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:điện thoại|sản phẩm|thiết bị|máy|cái)\s+(?:trên|đó|này)")
        .expect("Invalid reference phrase regex")
});

/// A purchase statement with the product left implicit, e.g. "mua luôn".
static BARE_PURCHASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:mua|chốt|lấy|đặt)(?:\s+(?:luôn|ngay|nó|đi|nhé|hàng|đơn))*\s*[.!?]*\s*$")
        .expect("Invalid bare purchase regex")
});

// =============================================================================
// ResolvedMessage
// =============================================================================

/// A message after reference resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedMessage {
    /// Message text, with any reference replaced by the concrete product.
    pub text: String,
    /// The product substituted in, when a reference was resolved.
    pub referent: Option<String>,
    /// True when `text` differs from the original message.
    pub rewritten: bool,
}

impl ResolvedMessage {
    fn untouched(message: &str) -> Self {
        ResolvedMessage {
            text: message.to_string(),
            referent: None,
            rewritten: false,
        }
    }
}

// =============================================================================
// ContextResolver
// =============================================================================

/// Resolves product references against recent conversation history.
pub struct ContextResolver {
    /// Messages scanned for a referent, newest first.
    window: usize,
}

impl ContextResolver {
    /// The scan window covers `history_turns` exchanges, two messages each.
    pub fn new(intent: &IntentConfig) -> Self {
        Self {
            window: intent.history_turns * 2,
        }
    }

    /// Substitute the most recent product mention for a reference phrase.
    ///
    /// Pure function of its inputs. Messages with no reference, and
    /// references with no referent in the window, pass through unchanged.
    pub fn resolve(&self, message: &str, history: &[Message]) -> ResolvedMessage {
        let reference = REFERENCE_PHRASE.find(message);
        if reference.is_none() && !BARE_PURCHASE.is_match(message) {
            return ResolvedMessage::untouched(message);
        }

        let Some(referent) = self.find_referent(history) else {
            return ResolvedMessage::untouched(message);
        };

        let text = match reference {
            Some(m) => {
                let mut text =
                    String::with_capacity(message.len() + referent.len());
                text.push_str(&message[..m.start()]);
                text.push_str(&referent);
                text.push_str(&message[m.end()..]);
                text
            }
            // Bare purchase statements name no product, so the referent is
            // appended instead of substituted.
            None => {
                let head = message
                    .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '.' | '!' | '?'));
                format!("{} {}", head, referent)
            }
        };

        debug!(%referent, "resolved product reference");
        ResolvedMessage {
            text,
            referent: Some(referent),
            rewritten: true,
        }
    }

    /// Most recent product mention within the window, either role.
    fn find_referent(&self, history: &[Message]) -> Option<String> {
        history
            .iter()
            .rev()
            .take(self.window)
            .find_map(|m| extract_product_mention(&m.text))
    }
}

// =============================================================================
// Tests
// =============================================================================
