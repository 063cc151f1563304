//! Order flow advancement.
//!
//! `advance` is a function of the current order state, the evidence mined
//! from the turn, and a catalog lookup. Stage changes all go through
//! `validate_transition`; turns that make no progress only bump
//! `stale_turns`, and enough stale turns abandon the order.

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use hawker_core::config::OrderConfig;
use hawker_core::types::{OrderStage, OrderState, Product};
use hawker_search::ProductIndex;

use crate::evidence::OrderEvidence;
use crate::state_machine::validate_transition;
use crate::templates::{self, ShopInfo};

/// Result of one order-flow turn.
#[derive(Clone, Debug)]
pub struct OrderOutcome {
    pub state: OrderState,
    pub reply: String,
}

/// Walks an order conversation through the stage machine.
pub struct OrderFlowHandler {
    shop: ShopInfo,
    abandon_turn_limit: u32,
}

impl OrderFlowHandler {
    pub fn new(shop: ShopInfo, config: &OrderConfig) -> Self {
        Self {
            shop,
            abandon_turn_limit: config.abandon_turn_limit,
        }
    }

    /// Advance one turn. Never fails: the stage dispatch below only requests
    /// legal transitions, and those are still checked at runtime.
    pub fn advance(
        &self,
        state: OrderState,
        evidence: &OrderEvidence,
        index: &ProductIndex,
    ) -> OrderOutcome {
        let mut state = state;

        if evidence.cancel && !state.stage.is_terminal() {
            self.transition(&mut state, OrderStage::Cancelled);
            state.updated_at = Utc::now();
            return OrderOutcome {
                state,
                reply: templates::cancelled(),
            };
        }

        let reply = match state.stage {
            OrderStage::Initiated => self.entry_turn(&mut state, evidence, index),
            OrderStage::AwaitingProduct => self.product_turn(&mut state, evidence, index),
            OrderStage::AwaitingContact => self.contact_turn(&mut state, evidence, index),
            OrderStage::Confirmed => templates::already_confirmed(&self.shop, state.order_id),
            OrderStage::Cancelled => templates::cancelled(),
        };
        state.updated_at = Utc::now();

        OrderOutcome { state, reply }
    }

    /// First turn of a fresh order. A catalog product named here skips the
    /// product stage entirely; contact details in the same message are not
    /// consumed, so confirmation always passes through AwaitingContact.
    fn entry_turn(
        &self,
        state: &mut OrderState,
        evidence: &OrderEvidence,
        index: &ProductIndex,
    ) -> String {
        if let Some(name) = &evidence.product {
            if let Some(product) = lookup(index, name) {
                self.transition(state, OrderStage::AwaitingContact);
                state.stale_turns = 0;
                let reply = templates::ask_contact(&self.shop, &product);
                state.product = Some(product);
                return reply;
            }
            self.transition(state, OrderStage::AwaitingProduct);
            state.stale_turns = 0;
            return templates::product_not_found(&self.shop, name);
        }
        self.transition(state, OrderStage::AwaitingProduct);
        state.stale_turns = 0;
        templates::ask_product()
    }

    /// Waiting for the customer to name something the shop carries.
    fn product_turn(
        &self,
        state: &mut OrderState,
        evidence: &OrderEvidence,
        index: &ProductIndex,
    ) -> String {
        if let Some(name) = &evidence.product {
            if let Some(product) = lookup(index, name) {
                self.transition(state, OrderStage::AwaitingContact);
                state.stale_turns = 0;
                let reply = templates::ask_contact(&self.shop, &product);
                state.product = Some(product);
                return reply;
            }
            return self.stall(state, templates::product_not_found(&self.shop, name));
        }
        self.stall(state, templates::clarify_product())
    }

    /// Product pinned, waiting for contact details.
    fn contact_turn(
        &self,
        state: &mut OrderState,
        evidence: &OrderEvidence,
        index: &ProductIndex,
    ) -> String {
        if let Some(contact) = &evidence.contact {
            // A different catalog product in the same turn swaps the pinned
            // one before confirming.
            if let Some(name) = &evidence.product {
                if let Some(product) = lookup(index, name) {
                    state.product = Some(product);
                }
            }
            if let Some(product) = state.product.clone() {
                let order_id = Uuid::new_v4();
                self.transition(state, OrderStage::Confirmed);
                state.contact = Some(contact.clone());
                state.order_id = Some(order_id);
                state.stale_turns = 0;
                return templates::confirmation(&self.shop, &product, contact, order_id);
            }
            // Contact arrived but no product is pinned. The order cannot
            // confirm, so ask for the product instead.
            return self.stall(state, templates::clarify_product());
        }

        // No contact. A different catalog product swaps the pinned one and
        // re-asks; anything else is a stall.
        if let Some(name) = &evidence.product {
            if let Some(product) = lookup(index, name) {
                if state.product.as_ref().map(|p| p.id) != Some(product.id) {
                    state.stale_turns = 0;
                    let reply = templates::ask_contact(&self.shop, &product);
                    state.product = Some(product);
                    return reply;
                }
            }
        }
        self.stall(state, templates::clarify_contact())
    }

    /// A turn that moves nothing. Enough of these abandon the order.
    fn stall(&self, state: &mut OrderState, reply: String) -> String {
        state.stale_turns += 1;
        if state.stale_turns >= self.abandon_turn_limit {
            self.transition(state, OrderStage::Cancelled);
            return templates::abandoned();
        }
        reply
    }

    /// Apply a stage change through the validator. The dispatch in `advance`
    /// only requests legal pairs; a rejection is logged and skipped.
    fn transition(&self, state: &mut OrderState, to: OrderStage) {
        match validate_transition(state.stage, to) {
            Ok(()) => state.stage = to,
            Err(error) => warn!(%error, "order transition rejected"),
        }
    }
}

/// Catalog lookup that treats index failures as not-found.
fn lookup(index: &ProductIndex, name: &str) -> Option<Product> {
    match index.find_by_name(name) {
        Ok(found) => found,
        Err(error) => {
            warn!(%error, "product lookup failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hawker_core::types::ContactInfo;

    fn shop() -> ShopInfo {
        ShopInfo {
            name: "HawkerPhone".to_string(),
            phone: "1900 8198".to_string(),
            email: "sales@hawkerphone.vn".to_string(),
        }
    }

    fn handler(limit: u32) -> OrderFlowHandler {
        OrderFlowHandler::new(
            shop(),
            &OrderConfig {
                abandon_turn_limit: limit,
            },
        )
    }

    fn catalog() -> ProductIndex {
        let index = ProductIndex::new();
        for (name, brand, price) in [
            ("iPhone 15 Pro", "Apple", 28_990_000i64),
            ("iPhone 15", "Apple", 24_990_000),
            ("Samsung Galaxy S24", "Samsung", 22_990_000),
        ] {
            index
                .insert(
                    Product {
                        id: Uuid::new_v4(),
                        name: name.to_string(),
                        brand: brand.to_string(),
                        price,
                        attributes: vec![],
                    },
                    vec![0.0; 8],
                )
                .unwrap();
        }
        index
    }

    fn with_product(name: &str) -> OrderEvidence {
        OrderEvidence {
            product: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn with_phone(phone: &str) -> OrderEvidence {
        OrderEvidence {
            contact: Some(ContactInfo::Phone(phone.to_string())),
            ..Default::default()
        }
    }

    fn cancel_evidence() -> OrderEvidence {
        OrderEvidence {
            cancel: true,
            ..Default::default()
        }
    }

    fn pinned(name: &str, price: i64) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            brand: "Apple".to_string(),
            price,
            attributes: vec![],
        }
    }

    // =========================================================================
    // Entry turns
    // =========================================================================

    #[test]
    fn test_entry_with_catalog_product_skips_to_contact() {
        let outcome = handler(5).advance(OrderState::new(), &with_product("iPhone 15"), &catalog());
        assert_eq!(outcome.state.stage, OrderStage::AwaitingContact);
        assert_eq!(outcome.state.product.as_ref().unwrap().name, "iPhone 15");
        assert!(outcome.reply.contains("iPhone 15"));
        assert!(outcome.reply.contains("24.990.000đ"));
    }

    #[test]
    fn test_entry_without_product_asks_for_one() {
        let outcome = handler(5).advance(OrderState::new(), &OrderEvidence::default(), &catalog());
        assert_eq!(outcome.state.stage, OrderStage::AwaitingProduct);
        assert_eq!(outcome.state.stale_turns, 0);
        assert!(outcome.reply.contains("sản phẩm"));
    }

    #[test]
    fn test_entry_with_unknown_product_reports_not_found() {
        let outcome =
            handler(5).advance(OrderState::new(), &with_product("Nokia 3310"), &catalog());
        assert_eq!(outcome.state.stage, OrderStage::AwaitingProduct);
        assert!(outcome.state.product.is_none());
        assert!(outcome.reply.contains("Nokia 3310"));
        assert!(outcome.reply.contains("không tìm thấy"));
    }

    #[test]
    fn test_entry_contact_is_not_consumed() {
        // Contact details in the opening message do not shortcut the flow;
        // confirmation still requires a contact turn at AwaitingContact.
        let evidence = OrderEvidence {
            product: Some("iPhone 15".to_string()),
            contact: Some(ContactInfo::Phone("0912345678".to_string())),
            ..Default::default()
        };
        let outcome = handler(5).advance(OrderState::new(), &evidence, &catalog());
        assert_eq!(outcome.state.stage, OrderStage::AwaitingContact);
        assert!(outcome.state.contact.is_none());
        assert!(outcome.state.order_id.is_none());
    }

    // =========================================================================
    // Product stage
    // =========================================================================

    #[test]
    fn test_product_stage_pins_and_advances() {
        let mut state = OrderState::new();
        state.stage = OrderStage::AwaitingProduct;
        let outcome = handler(5).advance(state, &with_product("Samsung Galaxy S24"), &catalog());
        assert_eq!(outcome.state.stage, OrderStage::AwaitingContact);
        assert_eq!(
            outcome.state.product.as_ref().unwrap().name,
            "Samsung Galaxy S24"
        );
        assert_eq!(outcome.state.stale_turns, 0);
    }

    #[test]
    fn test_unknown_product_at_product_stage_stalls() {
        let mut state = OrderState::new();
        state.stage = OrderStage::AwaitingProduct;
        let outcome = handler(5).advance(state, &with_product("Pixel 8"), &catalog());
        assert_eq!(outcome.state.stage, OrderStage::AwaitingProduct);
        assert_eq!(outcome.state.stale_turns, 1);
        assert!(outcome.reply.contains("Pixel 8"));
    }

    #[test]
    fn test_progress_resets_stale_turns() {
        let mut state = OrderState::new();
        state.stage = OrderStage::AwaitingProduct;
        state.stale_turns = 3;
        let outcome = handler(5).advance(state, &with_product("iPhone 15"), &catalog());
        assert_eq!(outcome.state.stage, OrderStage::AwaitingContact);
        assert_eq!(outcome.state.stale_turns, 0);
    }

    // =========================================================================
    // Contact stage
    // =========================================================================

    #[test]
    fn test_contact_confirms_and_assigns_order_id() {
        let mut state = OrderState::new();
        state.stage = OrderStage::AwaitingContact;
        state.product = Some(pinned("iPhone 15 Pro", 28_990_000));
        let outcome = handler(5).advance(state, &with_phone("0912345678"), &catalog());
        assert_eq!(outcome.state.stage, OrderStage::Confirmed);
        assert!(outcome.state.order_id.is_some());
        assert_eq!(
            outcome.state.contact,
            Some(ContactInfo::Phone("0912345678".to_string()))
        );
        assert!(outcome.reply.contains("DH-"));
        assert!(outcome.reply.contains("0912345678"));
        assert!(outcome.reply.contains("iPhone 15 Pro"));
    }

    #[test]
    fn test_order_id_assigned_only_at_confirmation() {
        let handler = handler(5);
        let index = catalog();

        let entry = handler.advance(OrderState::new(), &with_product("iPhone 15"), &index);
        assert!(entry.state.order_id.is_none());

        let confirmed = handler.advance(entry.state, &with_phone("0912345678"), &index);
        assert_eq!(confirmed.state.stage, OrderStage::Confirmed);
        assert!(confirmed.state.order_id.is_some());
    }

    #[test]
    fn test_product_swap_while_awaiting_contact() {
        let mut state = OrderState::new();
        state.stage = OrderStage::AwaitingContact;
        state.product = Some(pinned("iPhone 15", 24_990_000));
        state.stale_turns = 2;
        let outcome = handler(5).advance(state, &with_product("Samsung Galaxy S24"), &catalog());
        assert_eq!(outcome.state.stage, OrderStage::AwaitingContact);
        assert_eq!(
            outcome.state.product.as_ref().unwrap().name,
            "Samsung Galaxy S24"
        );
        assert_eq!(outcome.state.stale_turns, 0);
        assert!(outcome.reply.contains("Samsung Galaxy S24"));
    }

    #[test]
    fn test_restating_pinned_product_stalls() {
        let handler = handler(5);
        let index = catalog();
        let entry = handler.advance(OrderState::new(), &with_product("iPhone 15"), &index);
        assert_eq!(entry.state.stage, OrderStage::AwaitingContact);

        let again = handler.advance(entry.state, &with_product("iPhone 15"), &index);
        assert_eq!(again.state.stage, OrderStage::AwaitingContact);
        assert_eq!(again.state.stale_turns, 1);
    }

    #[test]
    fn test_swap_and_contact_in_same_turn_confirms_new_product() {
        let mut state = OrderState::new();
        state.stage = OrderStage::AwaitingContact;
        state.product = Some(pinned("iPhone 15", 24_990_000));
        let evidence = OrderEvidence {
            product: Some("Samsung Galaxy S24".to_string()),
            contact: Some(ContactInfo::Phone("0912345678".to_string())),
            ..Default::default()
        };
        let outcome = handler(5).advance(state, &evidence, &catalog());
        assert_eq!(outcome.state.stage, OrderStage::Confirmed);
        assert_eq!(
            outcome.state.product.as_ref().unwrap().name,
            "Samsung Galaxy S24"
        );
        assert!(outcome.reply.contains("Samsung Galaxy S24"));
    }

    #[test]
    fn test_contact_without_pinned_product_cannot_confirm() {
        let mut state = OrderState::new();
        state.stage = OrderStage::AwaitingContact;
        let outcome = handler(5).advance(state, &with_phone("0912345678"), &catalog());
        assert_eq!(outcome.state.stage, OrderStage::AwaitingContact);
        assert!(outcome.state.order_id.is_none());
        assert_eq!(outcome.state.stale_turns, 1);
    }

    // =========================================================================
    // Cancellation and abandonment
    // =========================================================================

    #[test]
    fn test_cancel_from_each_non_terminal_stage() {
        for stage in [
            OrderStage::Initiated,
            OrderStage::AwaitingProduct,
            OrderStage::AwaitingContact,
        ] {
            let mut state = OrderState::new();
            state.stage = stage;
            let outcome = handler(5).advance(state, &cancel_evidence(), &catalog());
            assert_eq!(outcome.state.stage, OrderStage::Cancelled);
            assert!(outcome.reply.contains("hủy"));
        }
    }

    #[test]
    fn test_stalls_accumulate_then_abandon() {
        let handler = handler(3);
        let index = catalog();
        let mut state = OrderState::new();
        state.stage = OrderStage::AwaitingContact;
        state.product = Some(pinned("iPhone 15", 24_990_000));

        let first = handler.advance(state, &OrderEvidence::default(), &index);
        assert_eq!(first.state.stale_turns, 1);
        assert_eq!(first.state.stage, OrderStage::AwaitingContact);
        assert!(first.reply.contains("liên hệ"));

        let second = handler.advance(first.state, &OrderEvidence::default(), &index);
        assert_eq!(second.state.stale_turns, 2);
        assert_eq!(second.state.stage, OrderStage::AwaitingContact);

        let third = handler.advance(second.state, &OrderEvidence::default(), &index);
        assert_eq!(third.state.stage, OrderStage::Cancelled);
        assert!(third.reply.contains("tạm đóng"));
    }

    // =========================================================================
    // Terminal stages
    // =========================================================================

    #[test]
    fn test_confirmed_order_turn_repeats_code() {
        let mut state = OrderState::new();
        state.stage = OrderStage::Confirmed;
        state.order_id = Some(Uuid::parse_str("3fa85f64-5717-4562-b3fc-2c963f66afa6").unwrap());
        let outcome = handler(5).advance(state, &with_phone("0912345678"), &catalog());
        assert_eq!(outcome.state.stage, OrderStage::Confirmed);
        assert!(outcome.reply.contains("DH-3FA85F64"));
    }

    #[test]
    fn test_cancel_after_confirmation_changes_nothing() {
        let mut state = OrderState::new();
        state.stage = OrderStage::Confirmed;
        state.order_id = Some(Uuid::new_v4());
        let outcome = handler(5).advance(state, &cancel_evidence(), &catalog());
        assert_eq!(outcome.state.stage, OrderStage::Confirmed);
        assert!(outcome.reply.contains("xác nhận"));
    }
}
