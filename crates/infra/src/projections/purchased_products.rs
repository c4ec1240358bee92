use storefront_core::ProductId;
use storefront_events::{EventEnvelope, Projection};
use storefront_purchasing::{PurchaseEvent, PurchaseState};

/// Products the customer bought this session, in first-purchase order.
///
/// Each product appears at most once, however many times its purchase is
/// re-confirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurchasedProducts {
    products: Vec<ProductId>,
}

impl PurchasedProducts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn product_ids(&self) -> &[ProductId] {
        &self.products
    }

    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.products.contains(product_id)
    }
}

impl Projection for PurchasedProducts {
    type Ev = PurchaseEvent;

    fn apply(&mut self, envelope: &EventEnvelope<PurchaseEvent>) {
        if let PurchaseEvent::PurchaseResolved(e) = envelope.payload() {
            if e.outcome == PurchaseState::Purchased && !self.contains(&e.product_id) {
                self.products.push(e.product_id.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use storefront_purchasing::PurchaseResolved;

    use super::*;

    fn resolved(product: &str, seq: u64, outcome: PurchaseState) -> EventEnvelope<PurchaseEvent> {
        let product_id = ProductId::new(product);
        EventEnvelope::new(
            Uuid::now_v7(),
            product_id.clone(),
            seq,
            PurchaseEvent::PurchaseResolved(PurchaseResolved {
                product_id,
                previous: PurchaseState::InProgress,
                outcome,
                reason: None,
                occurred_at: Utc::now(),
            }),
        )
    }

    #[test]
    fn only_purchases_are_listed_once_in_order() {
        let mut projection = PurchasedProducts::new();
        projection.apply(&resolved("b", 2, PurchaseState::Purchased));
        projection.apply(&resolved("a", 2, PurchaseState::Failed));
        projection.apply(&resolved("a", 4, PurchaseState::Purchased));
        projection.apply(&resolved("b", 3, PurchaseState::Purchased));

        assert_eq!(
            projection.product_ids(),
            &[ProductId::new("b"), ProductId::new("a")]
        );
    }
}
