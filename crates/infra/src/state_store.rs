//! Purchase state store (the reconciler).
//!
//! Holds one [`ProductPurchase`] aggregate per tracked product and runs every
//! state change through the same pipeline:
//!
//! ```text
//! command
//!   ↓
//! 1. look up the product's aggregate (write lock held from here)
//!   ↓
//! 2. handle + apply (transition table enforced by the aggregate)
//!   ↓
//! 3. wrap events in envelopes (sequence number = aggregate version)
//!   ↓
//! 4. fold into the purchased-products projection
//!   ↓
//! 5. publish to subscribers
//! ```
//!
//! Steps 2 to 5 happen under one write lock, so subscribers see each product's
//! transitions in exactly the order they were applied.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use storefront_core::{AggregateRoot, ProductId};
use storefront_events::{
    EventBus, EventEnvelope, InMemoryEventBus, ProjectionRunner, Subscription, execute,
};
use storefront_purchasing::{ProductPurchase, PurchaseCommand, PurchaseEvent, PurchaseState};

use crate::error::StoreError;
use crate::projections::PurchasedProducts;

/// Envelope type published by the store.
pub type StateEnvelope = EventEnvelope<PurchaseEvent>;

#[derive(Debug)]
struct Inner {
    purchases: HashMap<ProductId, ProductPurchase>,
    purchased: ProjectionRunner<PurchasedProducts>,
}

#[derive(Debug)]
pub struct PurchaseStateStore {
    inner: RwLock<Inner>,
    bus: InMemoryEventBus<StateEnvelope>,
}

impl Default for PurchaseStateStore {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner {
                purchases: HashMap::new(),
                purchased: ProjectionRunner::new(PurchasedProducts::new()),
            }),
            bus: InMemoryEventBus::new(),
        }
    }
}

impl PurchaseStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start tracking a product (`NotStarted`). Returns its current state;
    /// already-tracked products are left as they are.
    pub fn track(&self, product_id: &ProductId) -> PurchaseState {
        let mut inner = self.write();
        inner
            .purchases
            .entry(product_id.clone())
            .or_insert_with(|| ProductPurchase::empty(product_id.clone()))
            .state()
    }

    /// Current state; `Unknown` for products never tracked.
    pub fn state_of(&self, product_id: &ProductId) -> PurchaseState {
        self.read()
            .purchases
            .get(product_id)
            .map(ProductPurchase::state)
            .unwrap_or(PurchaseState::Unknown)
    }

    /// The product's aggregate (state, attempts, last reason); `None` if never
    /// tracked.
    pub fn purchase(&self, product_id: &ProductId) -> Option<ProductPurchase> {
        self.read().purchases.get(product_id).cloned()
    }

    /// Move a product to `target`, enforcing the transition table.
    pub fn set_state(&self, product_id: &ProductId, target: PurchaseState) -> Result<(), StoreError> {
        self.transition(product_id, target, None)
    }

    /// Like [`set_state`](Self::set_state), with a reason attached to the event.
    pub fn transition(
        &self,
        product_id: &ProductId,
        target: PurchaseState,
        reason: Option<String>,
    ) -> Result<(), StoreError> {
        let command = PurchaseCommand::transition_to(product_id.clone(), target, reason, Utc::now())?;
        self.dispatch(command).map(|_| ())
    }

    /// Atomic test-and-set into `InProgress`. Returns the state it replaced.
    ///
    /// Fails with [`StoreError::ConcurrentPurchaseRejected`] when an attempt for
    /// the product is already in flight.
    pub fn begin_purchase(&self, product_id: &ProductId) -> Result<PurchaseState, StoreError> {
        let command = PurchaseCommand::transition_to(
            product_id.clone(),
            PurchaseState::InProgress,
            None,
            Utc::now(),
        )?;
        let envelopes = self.dispatch(command)?;
        Ok(envelopes
            .first()
            .map(|env| env.payload().previous())
            .unwrap_or(PurchaseState::NotStarted))
    }

    pub fn subscribe(&self) -> Subscription<StateEnvelope> {
        self.bus.subscribe()
    }

    /// Products purchased this session, in first-purchase order.
    pub fn purchased_product_ids(&self) -> Vec<ProductId> {
        self.read().purchased.projection().product_ids().to_vec()
    }

    /// Every tracked product and its state.
    pub fn snapshot(&self) -> BTreeMap<ProductId, PurchaseState> {
        self.read()
            .purchases
            .iter()
            .map(|(id, purchase)| (id.clone(), purchase.state()))
            .collect()
    }

    fn dispatch(&self, command: PurchaseCommand) -> Result<Vec<StateEnvelope>, StoreError> {
        let product_id = command.product_id().clone();

        let mut guard = self.write();
        let inner = &mut *guard;

        // Untracked products behave as `Unknown`, which accepts no transition.
        let Some(aggregate) = inner.purchases.get_mut(&product_id) else {
            return Err(StoreError::InvalidTransition(format!(
                "{product_id} is not tracked (state {})",
                PurchaseState::Unknown
            )));
        };

        let events = execute(aggregate, &command)?;
        let first_seq = aggregate.version() - events.len() as u64 + 1;
        let envelopes: Vec<StateEnvelope> = events
            .into_iter()
            .enumerate()
            .map(|(i, ev)| {
                EventEnvelope::new(Uuid::now_v7(), product_id.clone(), first_seq + i as u64, ev)
            })
            .collect();

        for envelope in &envelopes {
            if let Err(e) = inner.purchased.apply(envelope) {
                warn!(
                    product_id = %product_id,
                    error = %e,
                    "purchased-products projection skipped event"
                );
            }
            debug!(
                product_id = %product_id,
                sequence = envelope.sequence_number(),
                from = %envelope.payload().previous(),
                to = %envelope.payload().state(),
                "purchase state changed"
            );
            if let Err(e) = self.bus.publish(envelope.clone()) {
                warn!(product_id = %product_id, error = ?e, "failed to publish state change");
            }
        }

        Ok(envelopes)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn roses() -> ProductId {
        ProductId::new("com.example.storefront.nonconsumable.roses.large")
    }

    #[test]
    fn untracked_products_are_unknown() {
        let store = PurchaseStateStore::new();
        assert_eq!(store.state_of(&roses()), PurchaseState::Unknown);
        assert!(matches!(
            store.set_state(&roses(), PurchaseState::InProgress),
            Err(StoreError::InvalidTransition(_))
        ));
    }

    #[test]
    fn track_is_idempotent() {
        let store = PurchaseStateStore::new();
        assert_eq!(store.track(&roses()), PurchaseState::NotStarted);
        store.begin_purchase(&roses()).unwrap();

        assert_eq!(store.track(&roses()), PurchaseState::InProgress);
    }

    #[test]
    fn purchased_cannot_go_back_to_in_progress() {
        let store = PurchaseStateStore::new();
        store.track(&roses());
        store.begin_purchase(&roses()).unwrap();
        store.set_state(&roses(), PurchaseState::Purchased).unwrap();

        let err = store.begin_purchase(&roses()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition(_)));
        assert_eq!(store.state_of(&roses()), PurchaseState::Purchased);
    }

    #[test]
    fn reconfirmation_does_not_duplicate_purchased_list() {
        let store = PurchaseStateStore::new();
        store.track(&roses());
        store.begin_purchase(&roses()).unwrap();
        store.set_state(&roses(), PurchaseState::Purchased).unwrap();
        store.set_state(&roses(), PurchaseState::Purchased).unwrap();

        assert_eq!(store.purchased_product_ids(), vec![roses()]);
    }

    #[test]
    fn subscribers_see_per_product_sequence() {
        let store = PurchaseStateStore::new();
        let sub = store.subscribe();
        store.track(&roses());
        store.begin_purchase(&roses()).unwrap();
        store
            .transition(&roses(), PurchaseState::Failed, Some("declined".into()))
            .unwrap();
        store.begin_purchase(&roses()).unwrap();

        let seen: Vec<(u64, PurchaseState)> = sub
            .drain()
            .iter()
            .map(|env| (env.sequence_number(), env.payload().state()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (1, PurchaseState::InProgress),
                (2, PurchaseState::Failed),
                (3, PurchaseState::InProgress),
            ]
        );
    }

    #[test]
    fn concurrent_begin_admits_exactly_one() {
        let store = Arc::new(PurchaseStateStore::new());
        store.track(&roses());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || store.begin_purchase(&roses()))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, StoreError::ConcurrentPurchaseRejected(_)))
        );
    }

    #[test]
    fn failure_reason_is_kept_until_the_next_attempt() {
        let store = PurchaseStateStore::new();
        assert!(store.purchase(&roses()).is_none());

        store.track(&roses());
        store.begin_purchase(&roses()).unwrap();
        store
            .transition(&roses(), PurchaseState::Failed, Some("card declined".into()))
            .unwrap();

        let failed = store.purchase(&roses()).unwrap();
        assert_eq!(failed.state(), PurchaseState::Failed);
        assert_eq!(failed.last_reason(), Some("card declined"));
        assert_eq!(failed.attempts(), 1);
        assert!(failed.updated_at().is_some());

        store.begin_purchase(&roses()).unwrap();
        let retried = store.purchase(&roses()).unwrap();
        assert_eq!(retried.last_reason(), None);
        assert_eq!(retried.attempts(), 2);
    }

    #[test]
    fn snapshot_lists_tracked_products() {
        let store = PurchaseStateStore::new();
        let other = ProductId::new("com.example.storefront.subscription.vip.gold");
        store.track(&roses());
        store.track(&other);
        store.set_state(&other, PurchaseState::CannotPay).unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&other], PurchaseState::CannotPay);
        assert_eq!(snapshot[&roses()], PurchaseState::NotStarted);
    }
}
