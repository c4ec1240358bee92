//! Commerce provider boundary.
//!
//! The provider owns the catalog, performs purchases against the platform
//! payment API, and is the source of truth for what the customer owns. The
//! core only talks to it through [`PurchaseProvider`].

mod sandbox;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_catalog::{Offering, StoreProduct};
use storefront_core::TransactionId;
use storefront_purchasing::CustomerInfo;

pub use sandbox::{SandboxOutcome, SandboxProvider};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider could not be reached (network, offline device).
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    /// The provider answered with an error.
    #[error("provider error: {0}")]
    Provider(String),

    /// No answer within the allowed time. The call itself keeps running.
    #[error("provider did not answer within {0:?}")]
    Timeout(Duration),

    /// The task running the provider call died before answering.
    #[error("provider task failed: {0}")]
    Task(String),
}

/// Result of a purchase call that did not error.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderPurchase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TransactionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_info: Option<CustomerInfo>,
    #[serde(default)]
    pub user_cancelled: bool,
    /// Deferred approval (e.g. ask-to-buy); the purchase may complete later.
    #[serde(default)]
    pub pending: bool,
}

#[async_trait::async_trait]
pub trait PurchaseProvider: Send + Sync + 'static {
    /// Whether this device may make payments at all.
    async fn can_make_payments(&self) -> bool;

    /// Products of the named offering; `None` when the provider has no such
    /// offering.
    async fn fetch_offerings(
        &self,
        offering_id: &str,
    ) -> Result<Option<Vec<StoreProduct>>, ProviderError>;

    async fn purchase(&self, offering: &Offering) -> Result<ProviderPurchase, ProviderError>;

    /// Latest customer info as known by the provider.
    async fn customer_info(&self) -> Result<CustomerInfo, ProviderError>;
}
