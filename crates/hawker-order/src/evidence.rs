//! Evidence extraction from a customer turn.
//!
//! Each turn is mined for the three signals the flow cares about: a wish to
//! cancel, a product name, and contact details. Extraction is shallow text
//! matching; the flow decides what each signal means for the current stage.

use std::sync::LazyLock;

use regex::Regex;

use hawker_core::text::normalize;
use hawker_core::types::ContactInfo;
use hawker_intent::extract_product_mention;

/// Phrases that abort the order outright. "hủy" and "huỷ" are the two
/// common tone placements of the same word.
const CANCEL_PHRASES: &[&str] = &[
    "hủy",
    "huỷ",
    "không mua nữa",
    "không đặt nữa",
    "thôi khỏi",
    "thôi không mua",
    "bỏ đơn",
    "dừng đơn",
    "không cần nữa",
    "đổi ý không mua",
];

/// Minimum characters for a captured address to count as one.
const MIN_ADDRESS_CHARS: usize = 5;

/// Vietnamese phone numbers: a `0` or `+84` prefix followed by 9 to 10
/// digits, tolerating spaces, dots and dashes between groups.
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\+84|0)[\d\s.\-]{8,14}\d").expect("Invalid phone regex"));

/// Address markers with the rest of the line captured as the address.
static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:địa chỉ|giao đến|giao tới|giao về|ship về|ship đến|gửi về)\s*(?:là\s+|:\s*)?(.+)")
        .expect("Invalid address regex")
});

/// Signals mined from one customer turn.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderEvidence {
    /// The customer wants out.
    pub cancel: bool,
    /// Display-ready product mention ("iPhone 15 Pro Max").
    pub product: Option<String>,
    /// Phone number or delivery address.
    pub contact: Option<ContactInfo>,
}

impl OrderEvidence {
    /// Mine one resolved message for order signals.
    pub fn extract(message: &str) -> Self {
        let text = normalize(message);
        Self {
            cancel: CANCEL_PHRASES.iter().any(|phrase| text.contains(phrase)),
            product: extract_product_mention(message),
            contact: extract_contact(message),
        }
    }
}

/// Contact details from free text. Phone numbers win over address markers
/// since they parse far more reliably.
pub fn extract_contact(message: &str) -> Option<ContactInfo> {
    if let Some(phone) = extract_phone(message) {
        return Some(ContactInfo::Phone(phone));
    }
    extract_address(message).map(ContactInfo::Address)
}

/// First phone number in the text, normalized to the local `0`-prefixed
/// digit form ("+84 912 345 678" -> "0912345678").
fn extract_phone(text: &str) -> Option<String> {
    for candidate in PHONE_PATTERN.find_iter(text) {
        let digits: String = candidate
            .as_str()
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        let local = match digits.strip_prefix("84") {
            Some(rest) if candidate.as_str().starts_with('+') => format!("0{}", rest),
            _ => digits,
        };
        // Local form is 0 plus 9 or 10 digits.
        if local.len() == 10 || local.len() == 11 {
            return Some(local);
        }
    }
    None
}

/// Text after the first address marker, when long enough to be an address.
fn extract_address(text: &str) -> Option<String> {
    let captures = ADDRESS_PATTERN.captures(text)?;
    let address = captures
        .get(1)?
        .as_str()
        .trim()
        .trim_end_matches(|c| c == '.' || c == '!')
        .trim();
    if address.chars().count() >= MIN_ADDRESS_CHARS {
        Some(address.to_string())
    } else {
        None
    }
}
