//! Order stage machine with validated transitions.
//!
//! Enforces the allowed transitions for the order lifecycle:
//! Initiated -> AwaitingProduct -> AwaitingContact -> Confirmed,
//! with Cancelled reachable from any non-terminal stage.

use hawker_core::types::OrderStage;

use crate::error::OrderError;

/// Validate that a stage transition is allowed.
///
/// Valid transitions:
/// - Initiated -> AwaitingProduct
/// - Initiated -> AwaitingContact (product named in the opening message)
/// - Initiated -> Cancelled
/// - AwaitingProduct -> AwaitingContact
/// - AwaitingProduct -> Cancelled
/// - AwaitingContact -> Confirmed
/// - AwaitingContact -> Cancelled
///
/// Terminal stages admit nothing, and staying put is not a transition: a
/// turn that makes no progress leaves the stage untouched.
pub fn validate_transition(from: OrderStage, to: OrderStage) -> Result<(), OrderError> {
    let valid = matches!(
        (from, to),
        (OrderStage::Initiated, OrderStage::AwaitingProduct)
            | (OrderStage::Initiated, OrderStage::AwaitingContact)
            | (OrderStage::Initiated, OrderStage::Cancelled)
            | (OrderStage::AwaitingProduct, OrderStage::AwaitingContact)
            | (OrderStage::AwaitingProduct, OrderStage::Cancelled)
            | (OrderStage::AwaitingContact, OrderStage::Confirmed)
            | (OrderStage::AwaitingContact, OrderStage::Cancelled)
    );

    if valid {
        Ok(())
    } else {
        Err(OrderError::InvalidTransition(from, to))
    }
}
