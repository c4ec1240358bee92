use serde::{Deserialize, Serialize};

/// Purchase state of a single product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseState {
    NotStarted,
    /// The device is not allowed to make payments. Terminal for the session.
    CannotPay,
    InProgress,
    Purchased,
    /// Awaiting external approval (e.g. deferred/ask-to-buy).
    Pending,
    Cancelled,
    Failed,
    /// The provider reported success but the entitlement did not check out.
    FailedVerification,
    /// Never tracked by the store.
    Unknown,
}

impl PurchaseState {
    /// The transition table.
    ///
    /// | From | Allowed To |
    /// |---|---|
    /// | NotStarted | InProgress, CannotPay |
    /// | InProgress | Purchased, Pending, Cancelled, Failed, FailedVerification |
    /// | Purchased | Purchased |
    /// | Pending, Cancelled, Failed, FailedVerification | InProgress |
    /// | CannotPay, Unknown | (none) |
    pub fn can_transition_to(self, to: PurchaseState) -> bool {
        use PurchaseState::*;

        match self {
            NotStarted => matches!(to, InProgress | CannotPay),
            InProgress => to.is_outcome(),
            Purchased => to == Purchased,
            Pending | Cancelled | Failed | FailedVerification => to == InProgress,
            CannotPay | Unknown => false,
        }
    }

    /// States a purchase attempt can resolve to.
    pub fn is_outcome(self) -> bool {
        matches!(
            self,
            PurchaseState::Purchased
                | PurchaseState::Pending
                | PurchaseState::Cancelled
                | PurchaseState::Failed
                | PurchaseState::FailedVerification
        )
    }

    /// A new attempt may start from this state.
    pub fn is_retryable(self) -> bool {
        self.can_transition_to(PurchaseState::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PurchaseState::NotStarted => "not_started",
            PurchaseState::CannotPay => "cannot_pay",
            PurchaseState::InProgress => "in_progress",
            PurchaseState::Purchased => "purchased",
            PurchaseState::Pending => "pending",
            PurchaseState::Cancelled => "cancelled",
            PurchaseState::Failed => "failed",
            PurchaseState::FailedVerification => "failed_verification",
            PurchaseState::Unknown => "unknown",
        }
    }
}

impl core::fmt::Display for PurchaseState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
