//! Store-level error model.
//!
//! Every public operation of the storefront core fails with [`StoreError`].
//! Domain errors raised by the purchase aggregate are mapped here the same way
//! for every caller, so the HTTP layer only has one enum to translate.

use thiserror::Error;

use storefront_core::DomainError;

use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Missing or invalid configuration (API key, product list).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The provider could not deliver a usable catalog.
    #[error("catalog fetch failed: {0}")]
    CatalogFetch(String),

    /// The user (or the device) declined the purchase.
    #[error("purchase rejected: {0}")]
    PurchaseRejected(String),

    #[error("purchase failed: {0}")]
    PurchaseFailed(String),

    /// The provider reported success but the entitlement did not match.
    #[error("purchase verification failed: {0}")]
    VerificationFailed(String),

    /// A purchase for the same product is already in flight.
    #[error("concurrent purchase rejected: {0}")]
    ConcurrentPurchaseRejected(String),

    /// A state change that the transition table does not allow.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Conflict(msg) => StoreError::ConcurrentPurchaseRejected(msg),
            DomainError::InvariantViolation(msg) => StoreError::InvalidTransition(msg),
            DomainError::Validation(msg) => StoreError::InvalidTransition(msg),
            DomainError::InvalidId(msg) => StoreError::InvalidTransition(msg),
        }
    }
}

impl From<ConfigError> for StoreError {
    fn from(value: ConfigError) -> Self {
        StoreError::Configuration(value.to_string())
    }
}
