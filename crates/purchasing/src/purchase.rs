use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateRoot, DomainError, ProductId};
use storefront_events::Event;

use crate::state::PurchaseState;

/// Aggregate root: ProductPurchase.
///
/// One instance per tracked product. A fresh instance starts in
/// [`PurchaseState::NotStarted`]; every accepted command moves it along the
/// transition table and bumps the version by one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPurchase {
    product_id: ProductId,
    state: PurchaseState,
    attempts: u32,
    last_reason: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
}

impl ProductPurchase {
    /// Create a tracked, not-yet-purchased aggregate.
    pub fn empty(product_id: ProductId) -> Self {
        Self {
            product_id,
            state: PurchaseState::NotStarted,
            attempts: 0,
            last_reason: None,
            updated_at: None,
            version: 0,
        }
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn state(&self) -> PurchaseState {
        self.state
    }

    /// Number of purchase attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reason recorded by the last resolution, if any.
    pub fn last_reason(&self) -> Option<&str> {
        self.last_reason.as_deref()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl AggregateRoot for ProductPurchase {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: BeginPurchase (test-and-set into `InProgress`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginPurchase {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResolvePurchase (end an in-flight attempt).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvePurchase {
    pub product_id: ProductId,
    pub outcome: PurchaseState,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DenyPayments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyPayments {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseCommand {
    BeginPurchase(BeginPurchase),
    ResolvePurchase(ResolvePurchase),
    DenyPayments(DenyPayments),
}

impl PurchaseCommand {
    /// Build the command that moves a product into `target`.
    ///
    /// `NotStarted` and `Unknown` are never reachable through a command.
    pub fn transition_to(
        product_id: ProductId,
        target: PurchaseState,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        match target {
            PurchaseState::InProgress => Ok(Self::BeginPurchase(BeginPurchase {
                product_id,
                occurred_at,
            })),
            PurchaseState::CannotPay => Ok(Self::DenyPayments(DenyPayments {
                product_id,
                occurred_at,
            })),
            outcome if outcome.is_outcome() => Ok(Self::ResolvePurchase(ResolvePurchase {
                product_id,
                outcome,
                reason,
                occurred_at,
            })),
            other => Err(DomainError::invariant(format!(
                "{other} is not a reachable purchase state"
            ))),
        }
    }

    pub fn product_id(&self) -> &ProductId {
        match self {
            PurchaseCommand::BeginPurchase(c) => &c.product_id,
            PurchaseCommand::ResolvePurchase(c) => &c.product_id,
            PurchaseCommand::DenyPayments(c) => &c.product_id,
        }
    }
}

/// Event: PurchaseStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseStarted {
    pub product_id: ProductId,
    pub previous: PurchaseState,
    pub attempt: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseResolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseResolved {
    pub product_id: ProductId,
    pub previous: PurchaseState,
    pub outcome: PurchaseState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentsDenied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentsDenied {
    pub product_id: ProductId,
    pub previous: PurchaseState,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PurchaseEvent {
    PurchaseStarted(PurchaseStarted),
    PurchaseResolved(PurchaseResolved),
    PaymentsDenied(PaymentsDenied),
}

impl PurchaseEvent {
    pub fn product_id(&self) -> &ProductId {
        match self {
            PurchaseEvent::PurchaseStarted(e) => &e.product_id,
            PurchaseEvent::PurchaseResolved(e) => &e.product_id,
            PurchaseEvent::PaymentsDenied(e) => &e.product_id,
        }
    }

    /// State before the event.
    pub fn previous(&self) -> PurchaseState {
        match self {
            PurchaseEvent::PurchaseStarted(e) => e.previous,
            PurchaseEvent::PurchaseResolved(e) => e.previous,
            PurchaseEvent::PaymentsDenied(e) => e.previous,
        }
    }

    /// State after the event.
    pub fn state(&self) -> PurchaseState {
        match self {
            PurchaseEvent::PurchaseStarted(_) => PurchaseState::InProgress,
            PurchaseEvent::PurchaseResolved(e) => e.outcome,
            PurchaseEvent::PaymentsDenied(_) => PurchaseState::CannotPay,
        }
    }
}

impl Event for PurchaseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseEvent::PurchaseStarted(_) => "purchasing.purchase.started",
            PurchaseEvent::PurchaseResolved(_) => "purchasing.purchase.resolved",
            PurchaseEvent::PaymentsDenied(_) => "purchasing.purchase.payments_denied",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseEvent::PurchaseStarted(e) => e.occurred_at,
            PurchaseEvent::PurchaseResolved(e) => e.occurred_at,
            PurchaseEvent::PaymentsDenied(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProductPurchase {
    type Command = PurchaseCommand;
    type Event = PurchaseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseEvent::PurchaseStarted(e) => {
                self.state = PurchaseState::InProgress;
                self.attempts = e.attempt;
                self.last_reason = None;
                self.updated_at = Some(e.occurred_at);
            }
            PurchaseEvent::PurchaseResolved(e) => {
                self.state = e.outcome;
                self.last_reason = e.reason.clone();
                self.updated_at = Some(e.occurred_at);
            }
            PurchaseEvent::PaymentsDenied(e) => {
                self.state = PurchaseState::CannotPay;
                self.updated_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        self.ensure_product_id(command.product_id())?;

        match command {
            PurchaseCommand::BeginPurchase(cmd) => self.handle_begin(cmd),
            PurchaseCommand::ResolvePurchase(cmd) => self.handle_resolve(cmd),
            PurchaseCommand::DenyPayments(cmd) => self.handle_deny(cmd),
        }
    }
}

impl ProductPurchase {
    fn ensure_product_id(&self, product_id: &ProductId) -> Result<(), DomainError> {
        if &self.product_id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn ensure_transition(&self, to: PurchaseState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(to) {
            return Err(DomainError::invariant(format!(
                "illegal transition {} -> {} for {}",
                self.state, to, self.product_id
            )));
        }
        Ok(())
    }

    fn handle_begin(&self, cmd: &BeginPurchase) -> Result<Vec<PurchaseEvent>, DomainError> {
        // At most one attempt in flight per product.
        if self.state == PurchaseState::InProgress {
            return Err(DomainError::conflict(format!(
                "purchase already in progress for {}",
                self.product_id
            )));
        }
        self.ensure_transition(PurchaseState::InProgress)?;

        Ok(vec![PurchaseEvent::PurchaseStarted(PurchaseStarted {
            product_id: cmd.product_id.clone(),
            previous: self.state,
            attempt: self.attempts + 1,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_resolve(&self, cmd: &ResolvePurchase) -> Result<Vec<PurchaseEvent>, DomainError> {
        if !cmd.outcome.is_outcome() {
            return Err(DomainError::validation(format!(
                "{} is not a purchase outcome",
                cmd.outcome
            )));
        }
        self.ensure_transition(cmd.outcome)?;

        Ok(vec![PurchaseEvent::PurchaseResolved(PurchaseResolved {
            product_id: cmd.product_id.clone(),
            previous: self.state,
            outcome: cmd.outcome,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deny(&self, cmd: &DenyPayments) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_transition(PurchaseState::CannotPay)?;

        Ok(vec![PurchaseEvent::PaymentsDenied(PaymentsDenied {
            product_id: cmd.product_id.clone(),
            previous: self.state,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_events::execute;

    fn roses() -> ProductId {
        ProductId::new("com.example.storefront.nonconsumable.roses.large")
    }

    fn begin(product_id: &ProductId) -> PurchaseCommand {
        PurchaseCommand::BeginPurchase(BeginPurchase {
            product_id: product_id.clone(),
            occurred_at: Utc::now(),
        })
    }

    fn resolve(product_id: &ProductId, outcome: PurchaseState) -> PurchaseCommand {
        PurchaseCommand::ResolvePurchase(ResolvePurchase {
            product_id: product_id.clone(),
            outcome,
            reason: None,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn begin_then_purchase() {
        let id = roses();
        let mut purchase = ProductPurchase::empty(id.clone());

        let started = execute(&mut purchase, &begin(&id)).unwrap();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].previous(), PurchaseState::NotStarted);
        assert_eq!(purchase.state(), PurchaseState::InProgress);
        assert_eq!(purchase.attempts(), 1);

        execute(&mut purchase, &resolve(&id, PurchaseState::Purchased)).unwrap();
        assert_eq!(purchase.state(), PurchaseState::Purchased);
        assert_eq!(purchase.version(), 2);
    }

    #[test]
    fn second_begin_while_in_flight_is_a_conflict() {
        let id = roses();
        let mut purchase = ProductPurchase::empty(id.clone());
        execute(&mut purchase, &begin(&id)).unwrap();

        let err = purchase.handle(&begin(&id)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(purchase.version(), 1);
    }

    #[test]
    fn failed_attempt_can_be_retried() {
        let id = roses();
        let mut purchase = ProductPurchase::empty(id.clone());
        execute(&mut purchase, &begin(&id)).unwrap();
        execute(&mut purchase, &resolve(&id, PurchaseState::Failed)).unwrap();
        execute(&mut purchase, &begin(&id)).unwrap();

        assert_eq!(purchase.state(), PurchaseState::InProgress);
        assert_eq!(purchase.attempts(), 2);
    }

    #[test]
    fn resolve_requires_in_flight_attempt() {
        let id = roses();
        let purchase = ProductPurchase::empty(id.clone());

        let err = purchase
            .handle(&resolve(&id, PurchaseState::Purchased))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn resolve_rejects_non_outcome_states() {
        let id = roses();
        let mut purchase = ProductPurchase::empty(id.clone());
        execute(&mut purchase, &begin(&id)).unwrap();

        let err = purchase
            .handle(&resolve(&id, PurchaseState::NotStarted))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn payments_denied_only_before_any_attempt() {
        let id = roses();
        let mut purchase = ProductPurchase::empty(id.clone());
        let deny = PurchaseCommand::transition_to(
            id.clone(),
            PurchaseState::CannotPay,
            None,
            Utc::now(),
        )
        .unwrap();

        execute(&mut purchase, &deny).unwrap();
        assert_eq!(purchase.state(), PurchaseState::CannotPay);

        // Terminal: nothing else is accepted.
        assert!(purchase.handle(&begin(&id)).is_err());
        assert!(purchase.handle(&deny).is_err());
    }

    #[test]
    fn mismatched_product_is_rejected() {
        let purchase = ProductPurchase::empty(roses());
        let other = ProductId::new("com.example.storefront.nonconsumable.flowers.small");

        assert!(matches!(
            purchase.handle(&begin(&other)),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn unreachable_targets_have_no_command() {
        for target in [PurchaseState::NotStarted, PurchaseState::Unknown] {
            assert!(PurchaseCommand::transition_to(roses(), target, None, Utc::now()).is_err());
        }
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = PurchaseEvent::PaymentsDenied(PaymentsDenied {
            product_id: roses(),
            previous: PurchaseState::NotStarted,
            occurred_at: DateTime::<Utc>::UNIX_EPOCH,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "payments_denied");
        assert_eq!(json["previous"], "not_started");
        assert_eq!(event.event_type(), "purchasing.purchase.payments_denied");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn any_target() -> impl Strategy<Value = PurchaseState> {
            prop_oneof![
                Just(PurchaseState::NotStarted),
                Just(PurchaseState::CannotPay),
                Just(PurchaseState::InProgress),
                Just(PurchaseState::Purchased),
                Just(PurchaseState::Pending),
                Just(PurchaseState::Cancelled),
                Just(PurchaseState::Failed),
                Just(PurchaseState::FailedVerification),
                Just(PurchaseState::Unknown),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: every accepted command follows the transition table,
            /// every rejected command leaves the aggregate untouched.
            #[test]
            fn random_commands_respect_transition_table(
                targets in prop::collection::vec(any_target(), 1..40)
            ) {
                let id = roses();
                let mut purchase = ProductPurchase::empty(id.clone());

                for target in targets {
                    let before = purchase.clone();
                    let Ok(cmd) = PurchaseCommand::transition_to(id.clone(), target, None, Utc::now()) else {
                        continue;
                    };

                    match execute(&mut purchase, &cmd) {
                        Ok(events) => {
                            prop_assert!(before.state().can_transition_to(target));
                            prop_assert_eq!(purchase.state(), target);
                            prop_assert_eq!(purchase.version(), before.version() + events.len() as u64);
                        }
                        Err(_) => {
                            prop_assert!(!before.state().can_transition_to(target));
                            prop_assert_eq!(&purchase, &before);
                        }
                    }
                }
            }
        }
    }
}
