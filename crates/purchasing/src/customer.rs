//! Customer purchase data as reported by the commerce provider.
//!
//! The provider is the source of truth for ownership. This module turns its
//! entitlement/transaction view into the two answers the app needs: "does the
//! customer own product X" and "what do we know about that purchase".

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_catalog::{ProductCategory, entitlement_id};
use storefront_core::{EntitlementId, ProductId, TransactionId};

/// One entitlement on the customer's account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementInfo {
    /// Product whose purchase granted the entitlement.
    pub product_id: ProductId,
    pub is_active: bool,
    pub will_renew: bool,
    pub latest_purchase_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
}

/// A one-time purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonSubscriptionTransaction {
    pub transaction_id: TransactionId,
    pub product_id: ProductId,
    pub purchase_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomerInfo {
    #[serde(default)]
    pub entitlements: HashMap<EntitlementId, EntitlementInfo>,
    #[serde(default)]
    pub non_subscription_transactions: Vec<NonSubscriptionTransaction>,
}

/// Why a reported purchase did not verify.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationFailure {
    #[error("entitlement {0} missing from customer info")]
    MissingEntitlement(EntitlementId),

    #[error("entitlement {0} is not active")]
    Inactive(EntitlementId),

    #[error("entitlement {entitlement} granted by {found}, expected {expected}")]
    ProductMismatch {
        entitlement: EntitlementId,
        expected: ProductId,
        found: ProductId,
    },
}

impl CustomerInfo {
    pub fn entitlement(&self, id: &EntitlementId) -> Option<&EntitlementInfo> {
        self.entitlements.get(id)
    }

    /// Check that `product_id` unlocked its entitlement.
    ///
    /// Passes only if the mapped entitlement exists, is active, and was
    /// granted by this exact product. Unmapped products are looked up under
    /// the empty sentinel like any other identifier.
    pub fn verify_purchase(
        &self,
        product_id: &ProductId,
    ) -> Result<&EntitlementInfo, VerificationFailure> {
        let id = entitlement_id(product_id);
        let info = self
            .entitlement(&id)
            .ok_or_else(|| VerificationFailure::MissingEntitlement(id.clone()))?;

        if !info.is_active {
            return Err(VerificationFailure::Inactive(id));
        }
        if &info.product_id != product_id {
            return Err(VerificationFailure::ProductMismatch {
                entitlement: id,
                expected: product_id.clone(),
                found: info.product_id.clone(),
            });
        }

        Ok(info)
    }

    /// Most recent purchase date anywhere on the account; `None` for an
    /// account with no purchases.
    pub fn latest_activity(&self) -> Option<DateTime<Utc>> {
        let subscriptions = self.entitlements.values().map(|e| e.latest_purchase_date);
        let one_time = self.non_subscription_transactions.iter().map(|t| t.purchase_date);
        subscriptions.chain(one_time).max()
    }

    /// Whether `self` is at least as recent as `other`.
    pub fn is_at_least_as_recent_as(&self, other: &CustomerInfo) -> bool {
        self.latest_activity() >= other.latest_activity()
    }

    /// Latest one-time purchase of a product.
    pub fn latest_transaction(&self, product_id: &ProductId) -> Option<&NonSubscriptionTransaction> {
        self.non_subscription_transactions
            .iter()
            .filter(|t| &t.product_id == product_id)
            .max_by_key(|t| t.purchase_date)
    }

    /// Ownership check.
    ///
    /// Subscriptions are owned while their entitlement is active. Anything
    /// else counts as owned once a one-time transaction for it exists.
    pub fn is_purchased(&self, product_id: &ProductId, category: Option<ProductCategory>) -> bool {
        match category {
            Some(ProductCategory::Subscription) => self
                .entitlement(&entitlement_id(product_id))
                .is_some_and(|e| e.is_active),
            _ => self.latest_transaction(product_id).is_some(),
        }
    }

    pub fn purchase_record(
        &self,
        product_id: &ProductId,
        category: Option<ProductCategory>,
    ) -> Option<PurchaseRecord> {
        match category {
            Some(ProductCategory::Subscription) => {
                let info = self.entitlement(&entitlement_id(product_id))?;
                Some(PurchaseRecord {
                    product_id: product_id.clone(),
                    category: ProductCategory::Subscription,
                    purchase_date: info.latest_purchase_date,
                    expiration_date: info.expiration_date,
                    will_renew: info.will_renew,
                    is_active: info.is_active,
                })
            }
            _ => {
                let tx = self.latest_transaction(product_id)?;
                Some(PurchaseRecord {
                    product_id: product_id.clone(),
                    category: ProductCategory::NonConsumable,
                    purchase_date: tx.purchase_date,
                    expiration_date: None,
                    will_renew: false,
                    is_active: true,
                })
            }
        }
    }
}

/// Summary of one owned (or previously owned) product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub product_id: ProductId,
    pub category: ProductCategory,
    pub purchase_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    pub will_renew: bool,
    pub is_active: bool,
}

const DATE_FORMAT: &str = "%-d %b %Y";

impl core::fmt::Display for PurchaseRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.category {
            ProductCategory::Subscription if !self.is_active => {
                f.write_str("Subscription has expired")
            }
            ProductCategory::Subscription => {
                f.write_str("Subscription.")?;
                if let Some(expires) = self.expiration_date {
                    let verb = if self.will_renew { "Renews" } else { "Expires" };
                    writeln!(f, " {verb} {}.", expires.format(DATE_FORMAT))?;
                }
                write!(
                    f,
                    "Most recent purchase {}.",
                    self.purchase_date.format(DATE_FORMAT)
                )
            }
            ProductCategory::NonConsumable => {
                write!(f, "Purchased {}", self.purchase_date.format(DATE_FORMAT))
            }
        }
    }
}

/// Human-readable purchase info for display.
pub fn purchase_info_text(record: Option<&PurchaseRecord>) -> String {
    match record {
        Some(record) => record.to_string(),
        None => "No purchase information available".to_string(),
    }
}
