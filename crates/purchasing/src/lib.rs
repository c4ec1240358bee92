//! Purchasing domain module (per-product purchase state machine).
//!
//! This crate contains the business rules for purchase attempts, implemented
//! purely as deterministic domain logic (no IO, no provider calls), plus the
//! model of the customer/entitlement data reported by the commerce provider.

pub mod customer;
pub mod purchase;
pub mod state;

pub use customer::{
    CustomerInfo, EntitlementInfo, NonSubscriptionTransaction, PurchaseRecord, VerificationFailure,
    purchase_info_text,
};
pub use purchase::{
    BeginPurchase, DenyPayments, PaymentsDenied, ProductPurchase, PurchaseCommand, PurchaseEvent,
    PurchaseResolved, PurchaseStarted, ResolvePurchase,
};
pub use state::PurchaseState;
