//! In-memory provider with scripted outcomes.
//!
//! Stands in for the commerce SDK in tests and local runs. Each product can be
//! given a [`SandboxOutcome`]; products without one are approved. Approved
//! purchases accumulate in the sandbox's own customer info, so later
//! `customer_info()` calls see them the way a real provider would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use storefront_catalog::{Offering, StoreProduct, entitlement_id};
use storefront_core::{ProductId, TransactionId};
use storefront_purchasing::{CustomerInfo, EntitlementInfo, NonSubscriptionTransaction};

use super::{ProviderError, ProviderPurchase, PurchaseProvider};
use crate::config::SandboxConfig;

/// Scripted result of a sandbox purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SandboxOutcome {
    /// Grant the product's entitlement.
    Approve,
    Cancel,
    Fail { message: String },
    /// Deferred approval.
    Pending,
    /// Report success, but the entitlement is granted by another product.
    MismatchedEntitlement { granted_by: ProductId },
    /// Report success with an inactive entitlement.
    InactiveEntitlement,
    /// Report success without customer info.
    MissingCustomerInfo,
    /// Wait, then behave like `then`.
    Delayed {
        delay_ms: u64,
        then: Box<SandboxOutcome>,
    },
    /// Never answer.
    Hang,
}

#[derive(Debug)]
pub struct SandboxProvider {
    offerings: Mutex<HashMap<String, Vec<StoreProduct>>>,
    outcomes: Mutex<HashMap<ProductId, SandboxOutcome>>,
    customer: Mutex<CustomerInfo>,
    payments_allowed: AtomicBool,
    offline: AtomicBool,
    purchase_calls: AtomicUsize,
    customer_info_calls: AtomicUsize,
    offering_calls: AtomicUsize,
}

impl Default for SandboxProvider {
    fn default() -> Self {
        Self {
            offerings: Mutex::new(HashMap::new()),
            outcomes: Mutex::new(HashMap::new()),
            customer: Mutex::new(CustomerInfo::default()),
            payments_allowed: AtomicBool::new(true),
            offline: AtomicBool::new(false),
            purchase_calls: AtomicUsize::new(0),
            customer_info_calls: AtomicUsize::new(0),
            offering_calls: AtomicUsize::new(0),
        }
    }
}

impl SandboxProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(offering_id: &str, config: &SandboxConfig) -> Self {
        let provider = Self::new().with_offering(offering_id, config.products.clone());
        provider
            .payments_allowed
            .store(config.payments_allowed, Ordering::SeqCst);
        for (product_id, outcome) in &config.outcomes {
            provider.set_outcome(product_id.clone(), outcome.clone());
        }
        provider
    }

    pub fn with_offering(self, offering_id: impl Into<String>, products: Vec<StoreProduct>) -> Self {
        self.set_offering(offering_id, products);
        self
    }

    /// Replace what an offering contains from now on.
    pub fn set_offering(&self, offering_id: impl Into<String>, products: Vec<StoreProduct>) {
        lock(&self.offerings).insert(offering_id.into(), products);
    }

    pub fn with_outcome(self, product_id: ProductId, outcome: SandboxOutcome) -> Self {
        self.set_outcome(product_id, outcome);
        self
    }

    pub fn set_outcome(&self, product_id: ProductId, outcome: SandboxOutcome) {
        lock(&self.outcomes).insert(product_id, outcome);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_payments_allowed(&self, allowed: bool) {
        self.payments_allowed.store(allowed, Ordering::SeqCst);
    }

    pub fn purchase_calls(&self) -> usize {
        self.purchase_calls.load(Ordering::SeqCst)
    }

    pub fn customer_info_calls(&self) -> usize {
        self.customer_info_calls.load(Ordering::SeqCst)
    }

    pub fn offering_calls(&self) -> usize {
        self.offering_calls.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> Result<(), ProviderError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ProviderError::Unreachable("sandbox is offline".into()));
        }
        Ok(())
    }

    fn outcome_for(&self, product_id: &ProductId) -> SandboxOutcome {
        lock(&self.outcomes)
            .get(product_id)
            .cloned()
            .unwrap_or(SandboxOutcome::Approve)
    }

    /// Record a grant in the sandbox customer info and return a copy of it.
    fn grant(&self, offering: &Offering, granted_by: &ProductId, active: bool) -> (TransactionId, CustomerInfo) {
        let now = Utc::now();
        let transaction_id = TransactionId::new(format!(
            "sandbox-{}",
            self.purchase_calls.load(Ordering::SeqCst)
        ));

        let mut customer = lock(&self.customer);
        let entitlement = if offering.is_subscription() {
            EntitlementInfo {
                product_id: granted_by.clone(),
                is_active: active,
                will_renew: active,
                latest_purchase_date: now,
                expiration_date: Some(now + chrono::Duration::days(30)),
            }
        } else {
            if active {
                customer
                    .non_subscription_transactions
                    .push(NonSubscriptionTransaction {
                        transaction_id: transaction_id.clone(),
                        product_id: granted_by.clone(),
                        purchase_date: now,
                    });
            }
            EntitlementInfo {
                product_id: granted_by.clone(),
                is_active: active,
                will_renew: false,
                latest_purchase_date: now,
                expiration_date: None,
            }
        };
        customer
            .entitlements
            .insert(entitlement_id(offering.product_id()), entitlement);

        (transaction_id, customer.clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait::async_trait]
impl PurchaseProvider for SandboxProvider {
    async fn can_make_payments(&self) -> bool {
        self.payments_allowed.load(Ordering::SeqCst)
    }

    async fn fetch_offerings(
        &self,
        offering_id: &str,
    ) -> Result<Option<Vec<StoreProduct>>, ProviderError> {
        self.offering_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        Ok(lock(&self.offerings).get(offering_id).cloned())
    }

    async fn purchase(&self, offering: &Offering) -> Result<ProviderPurchase, ProviderError> {
        self.purchase_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;

        let product_id = offering.product_id();
        let mut outcome = self.outcome_for(product_id);
        let outcome = loop {
            match outcome {
                SandboxOutcome::Delayed { delay_ms, then } => {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    outcome = *then;
                }
                SandboxOutcome::Hang => return std::future::pending().await,
                other => break other,
            }
        };
        debug!(product_id = %product_id, ?outcome, "sandbox purchase");

        match outcome {
            SandboxOutcome::Cancel => Ok(ProviderPurchase {
                user_cancelled: true,
                ..ProviderPurchase::default()
            }),
            SandboxOutcome::Fail { message } => Err(ProviderError::Provider(message)),
            SandboxOutcome::Pending => Ok(ProviderPurchase {
                pending: true,
                ..ProviderPurchase::default()
            }),
            SandboxOutcome::MissingCustomerInfo => {
                let (transaction_id, _) = self.grant(offering, product_id, true);
                Ok(ProviderPurchase {
                    transaction_id: Some(transaction_id),
                    ..ProviderPurchase::default()
                })
            }
            SandboxOutcome::MismatchedEntitlement { granted_by } => {
                let (transaction_id, info) = self.grant(offering, &granted_by, true);
                Ok(ProviderPurchase {
                    transaction_id: Some(transaction_id),
                    customer_info: Some(info),
                    ..ProviderPurchase::default()
                })
            }
            SandboxOutcome::InactiveEntitlement => {
                let (transaction_id, info) = self.grant(offering, product_id, false);
                Ok(ProviderPurchase {
                    transaction_id: Some(transaction_id),
                    customer_info: Some(info),
                    ..ProviderPurchase::default()
                })
            }
            SandboxOutcome::Approve
            | SandboxOutcome::Delayed { .. }
            | SandboxOutcome::Hang => {
                let (transaction_id, info) = self.grant(offering, product_id, true);
                Ok(ProviderPurchase {
                    transaction_id: Some(transaction_id),
                    customer_info: Some(info),
                    ..ProviderPurchase::default()
                })
            }
        }
    }

    async fn customer_info(&self) -> Result<CustomerInfo, ProviderError> {
        self.customer_info_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        Ok(lock(&self.customer).clone())
    }
}
