//! Order flow for Hawker.
//!
//! Order conversations walk a validated stage machine from first purchase
//! intent to a confirmed order. Every customer turn is mined for evidence
//! (a cancellation, a product name, contact details), the flow advances the
//! stage accordingly, and each reply comes from the Vietnamese template set.

pub mod error;
pub mod evidence;
pub mod flow;
pub mod state_machine;
pub mod templates;

pub use error::OrderError;
pub use evidence::OrderEvidence;
pub use flow::{OrderFlowHandler, OrderOutcome};
pub use state_machine::validate_transition;
pub use templates::{order_code, ShopInfo};
