//! Error types for the order flow.

use hawker_core::types::OrderStage;

/// Errors from the order subsystem.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("invalid order transition: {0} -> {1}")]
    InvalidTransition(OrderStage, OrderStage),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_display_names_both_stages() {
        let err = OrderError::InvalidTransition(OrderStage::Confirmed, OrderStage::Initiated);
        assert_eq!(
            err.to_string(),
            "invalid order transition: confirmed -> initiated"
        );
    }

    #[test]
    fn test_error_debug() {
        let err = OrderError::InvalidTransition(
            OrderStage::Cancelled,
            OrderStage::AwaitingProduct,
        );
        let dbg = format!("{:?}", err);
        assert!(dbg.contains("InvalidTransition"));
    }
}
