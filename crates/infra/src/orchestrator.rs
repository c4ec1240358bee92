//! Purchase orchestration: catalog refresh, purchases, ownership queries.
//!
//! ## Purchase flow
//!
//! ```text
//! purchase(p)
//!   ↓
//! payments allowed?        no  → cannot_pay
//!   ↓
//! already purchased?       yes → re-confirm, purchased
//!   ↓
//! offered by the catalog?  no  → in_progress → failed (no provider call)
//!   ↓
//! begin (test-and-set)     busy → ConcurrentPurchaseRejected
//!   ↓
//! provider purchase on its own task, bounded by purchase_timeout
//!   ↓
//! cancelled / pending / failed / verify entitlement
//!   ↓
//! purchased | failed_verification
//! ```
//!
//! The orchestrator never aborts a provider call. When the timeout fires the
//! product is marked failed; a result that arrives later is only logged. The
//! customer info it carries is cached for queries unless the cache already
//! holds a copy with more recent purchases.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use storefront_catalog::{CatalogCache, CatalogSnapshot, EntitlementMapper, Offering};
use storefront_core::ProductId;
use storefront_purchasing::{CustomerInfo, PurchaseRecord, PurchaseState, purchase_info_text};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::provider::{ProviderError, ProviderPurchase, PurchaseProvider};
use crate::state_store::PurchaseStateStore;

/// What the orchestrator needs from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Products the app sells; provider products outside this list are ignored.
    pub products: Vec<ProductId>,
    pub offering_id: String,
    pub purchase_timeout: Duration,
    pub query_timeout: Duration,
    /// Set when configuration could not be loaded; refresh reports it.
    pub config_error: Option<String>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            products: Vec::new(),
            offering_id: "default".to_string(),
            purchase_timeout: Duration::from_secs(60),
            query_timeout: Duration::from_secs(5),
            config_error: None,
        }
    }
}

impl From<&StoreConfig> for OrchestratorSettings {
    fn from(config: &StoreConfig) -> Self {
        Self {
            products: config.products.clone(),
            offering_id: config.offering_id.clone(),
            purchase_timeout: config.purchase_timeout(),
            query_timeout: config.query_timeout(),
            config_error: None,
        }
    }
}

impl OrchestratorSettings {
    /// Settings for a process whose configuration failed to load.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            config_error: Some(reason.into()),
            ..Self::default()
        }
    }
}

type CustomerCache = Arc<RwLock<Option<CustomerInfo>>>;

pub struct PurchaseOrchestrator {
    provider: Arc<dyn PurchaseProvider>,
    catalog: Arc<CatalogCache>,
    mapper: EntitlementMapper,
    store: Arc<PurchaseStateStore>,
    settings: OrchestratorSettings,
    payments_allowed: OnceCell<bool>,
    customer: CustomerCache,
}

impl core::fmt::Debug for PurchaseOrchestrator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PurchaseOrchestrator")
            .field("settings", &self.settings)
            .field("catalog_revision", &self.catalog.current_offerings().revision())
            .finish_non_exhaustive()
    }
}

impl PurchaseOrchestrator {
    pub fn new(
        provider: Arc<dyn PurchaseProvider>,
        store: Arc<PurchaseStateStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        let catalog = Arc::new(CatalogCache::new());
        Self {
            provider,
            mapper: EntitlementMapper::new(catalog.clone()),
            catalog,
            store,
            settings,
            payments_allowed: OnceCell::new(),
            customer: Arc::new(RwLock::new(None)),
        }
    }

    pub fn store(&self) -> &Arc<PurchaseStateStore> {
        &self.store
    }

    pub fn mapper(&self) -> &EntitlementMapper {
        &self.mapper
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn offerings(&self) -> Arc<CatalogSnapshot> {
        self.catalog.current_offerings()
    }

    pub fn state_of(&self, product_id: &ProductId) -> PurchaseState {
        self.store.state_of(product_id)
    }

    /// Replace the catalog with the provider's current offering.
    ///
    /// On any failure the previous catalog stays in place.
    pub async fn refresh(&self) -> Result<Arc<CatalogSnapshot>, StoreError> {
        if let Some(reason) = &self.settings.config_error {
            return Err(StoreError::Configuration(reason.clone()));
        }
        if self.settings.products.is_empty() {
            return Err(StoreError::Configuration("product list is empty".into()));
        }

        let fetched = self
            .provider
            .fetch_offerings(&self.settings.offering_id)
            .await
            .map_err(|e| {
                warn!(error = %e, "catalog refresh failed");
                StoreError::CatalogFetch(e.to_string())
            })?;

        let Some(products) = fetched else {
            warn!(offering_id = %self.settings.offering_id, "provider has no current offering");
            return Err(StoreError::CatalogFetch(format!(
                "no current offering {}",
                self.settings.offering_id
            )));
        };
        if products.is_empty() {
            return Err(StoreError::CatalogFetch("current offering is empty".into()));
        }

        let wanted: HashSet<&ProductId> = self.settings.products.iter().collect();
        let offerings: Vec<Offering> = products
            .into_iter()
            .filter(|p| wanted.contains(&p.product_id))
            .map(Offering::from)
            .collect();
        if offerings.is_empty() {
            warn!(
                offering_id = %self.settings.offering_id,
                "current offering has none of the configured products"
            );
            return Err(StoreError::CatalogFetch(
                "current offering has none of the configured products".into(),
            ));
        }

        let snapshot = self.catalog.replace(offerings);
        for offering in snapshot.offerings() {
            self.store.track(offering.product_id());
        }

        info!(
            revision = snapshot.revision(),
            offerings = snapshot.offerings().len(),
            "catalog refreshed"
        );
        Ok(snapshot)
    }

    async fn can_make_payments(&self) -> bool {
        *self
            .payments_allowed
            .get_or_init(|| async { self.provider.can_make_payments().await })
            .await
    }

    pub async fn purchase(&self, product_id: &ProductId) -> Result<PurchaseState, StoreError> {
        if !self.can_make_payments().await {
            return self.deny_payments(product_id);
        }

        if self.store.state_of(product_id) == PurchaseState::Purchased {
            return self.reconfirm(product_id);
        }

        let Some(offering) = self.catalog.offering(product_id) else {
            // Record the attempt so observers see why nothing happened.
            if let Some(state) = self.begin_attempt(product_id)? {
                return Ok(state);
            }
            let reason = format!("{product_id} is not in the catalog");
            self.store
                .transition(product_id, PurchaseState::Failed, Some(reason.clone()))?;
            warn!(product_id = %product_id, "purchase of unknown product");
            return Err(StoreError::PurchaseFailed(reason));
        };

        if let Some(state) = self.begin_attempt(product_id)? {
            return Ok(state);
        }
        info!(product_id = %product_id, "purchase started");

        let result = self.call_provider(offering).await;
        self.resolve(product_id, result)
    }

    /// Idempotent re-confirmation; nothing new is bought.
    fn reconfirm(&self, product_id: &ProductId) -> Result<PurchaseState, StoreError> {
        self.store.set_state(product_id, PurchaseState::Purchased)?;
        info!(product_id = %product_id, "product already purchased");
        Ok(PurchaseState::Purchased)
    }

    /// Track the product and move it into `InProgress`.
    ///
    /// Returns `Some(Purchased)` instead when another attempt resolved the
    /// product to `Purchased` after the caller last looked at its state.
    fn begin_attempt(&self, product_id: &ProductId) -> Result<Option<PurchaseState>, StoreError> {
        self.store.track(product_id);
        match self.store.begin_purchase(product_id) {
            Ok(_) => Ok(None),
            Err(StoreError::InvalidTransition(_))
                if self.store.state_of(product_id) == PurchaseState::Purchased =>
            {
                self.reconfirm(product_id).map(Some)
            }
            Err(e) => Err(e),
        }
    }

    fn deny_payments(&self, product_id: &ProductId) -> Result<PurchaseState, StoreError> {
        match self.store.track(product_id) {
            PurchaseState::NotStarted => {
                self.store.set_state(product_id, PurchaseState::CannotPay)?;
                warn!(product_id = %product_id, "payments are not allowed on this device");
                Ok(PurchaseState::CannotPay)
            }
            PurchaseState::CannotPay => Ok(PurchaseState::CannotPay),
            other => Err(StoreError::PurchaseRejected(format!(
                "payments are not allowed on this device ({product_id} is {other})"
            ))),
        }
    }

    /// Run the provider purchase on its own task, bounded by the purchase
    /// timeout. Customer info in the result is cached whenever it arrives.
    async fn call_provider(&self, offering: Offering) -> Result<ProviderPurchase, ProviderError> {
        let provider = self.provider.clone();
        let cache = self.customer.clone();
        let product_id = offering.product_id().clone();

        let mut task = tokio::spawn(async move {
            let result = provider.purchase(&offering).await;
            if let Ok(ProviderPurchase {
                customer_info: Some(info),
                ..
            }) = &result
            {
                store_customer_if_newer(&cache, info.clone());
            }
            result
        });

        match tokio::time::timeout(self.settings.purchase_timeout, &mut task).await {
            Ok(joined) => joined.map_err(|e| ProviderError::Task(e.to_string()))?,
            Err(_) => {
                let timeout = self.settings.purchase_timeout;
                tokio::spawn(async move {
                    match task.await {
                        Ok(Ok(late)) => info!(
                            product_id = %product_id,
                            cancelled = late.user_cancelled,
                            pending = late.pending,
                            "provider answered after timeout; result ignored"
                        ),
                        Ok(Err(e)) => {
                            warn!(product_id = %product_id, error = %e, "late provider error")
                        }
                        Err(e) => {
                            warn!(product_id = %product_id, error = %e, "provider task failed")
                        }
                    }
                });
                Err(ProviderError::Timeout(timeout))
            }
        }
    }

    fn resolve(
        &self,
        product_id: &ProductId,
        result: Result<ProviderPurchase, ProviderError>,
    ) -> Result<PurchaseState, StoreError> {
        let purchase = match result {
            Ok(purchase) => purchase,
            Err(e) => {
                let reason = e.to_string();
                self.store
                    .transition(product_id, PurchaseState::Failed, Some(reason.clone()))?;
                warn!(product_id = %product_id, error = %reason, "purchase failed");
                return Err(StoreError::PurchaseFailed(reason));
            }
        };

        if purchase.user_cancelled {
            self.store.set_state(product_id, PurchaseState::Cancelled)?;
            info!(product_id = %product_id, "purchase cancelled by user");
            return Err(StoreError::PurchaseRejected("cancelled by user".into()));
        }

        if purchase.pending {
            self.store.set_state(product_id, PurchaseState::Pending)?;
            info!(product_id = %product_id, "purchase pending approval");
            return Ok(PurchaseState::Pending);
        }

        let Some(info) = purchase.customer_info else {
            let reason = "provider returned no customer info".to_string();
            self.store
                .transition(product_id, PurchaseState::Failed, Some(reason.clone()))?;
            warn!(product_id = %product_id, error = %reason, "purchase failed");
            return Err(StoreError::PurchaseFailed(reason));
        };

        if let Err(failure) = info.verify_purchase(product_id) {
            let reason = failure.to_string();
            self.store.transition(
                product_id,
                PurchaseState::FailedVerification,
                Some(reason.clone()),
            )?;
            error!(
                product_id = %product_id,
                transaction_id = ?purchase.transaction_id,
                error = %reason,
                "purchase verification failed"
            );
            return Err(StoreError::VerificationFailed(reason));
        }

        self.store.set_state(product_id, PurchaseState::Purchased)?;
        info!(
            product_id = %product_id,
            transaction_id = ?purchase.transaction_id,
            "purchase verified"
        );
        Ok(PurchaseState::Purchased)
    }

    /// Latest customer info: fresh from the provider when it answers within
    /// the query timeout, otherwise the last cached copy.
    async fn customer_info(&self) -> Option<CustomerInfo> {
        match tokio::time::timeout(self.settings.query_timeout, self.provider.customer_info()).await
        {
            Ok(Ok(info)) => {
                store_customer(&self.customer, info.clone());
                Some(info)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "customer info unavailable; using cached copy");
                self.cached_customer_info()
            }
            Err(_) => {
                warn!("customer info timed out; using cached copy");
                self.cached_customer_info()
            }
        }
    }

    pub fn cached_customer_info(&self) -> Option<CustomerInfo> {
        self.customer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Accept a customer info update pushed by the provider.
    pub fn record_customer_info(&self, info: CustomerInfo) {
        store_customer(&self.customer, info);
    }

    pub async fn is_purchased(&self, product_id: &ProductId) -> bool {
        let category = self.mapper.category(product_id);
        self.customer_info()
            .await
            .is_some_and(|info| info.is_purchased(product_id, category))
    }

    pub async fn purchase_record(&self, product_id: &ProductId) -> Option<PurchaseRecord> {
        let category = self.mapper.category(product_id);
        self.customer_info()
            .await
            .and_then(|info| info.purchase_record(product_id, category))
    }

    /// Display text describing what the customer owns of `product_id`.
    pub async fn purchase_info(&self, product_id: &ProductId) -> String {
        purchase_info_text(self.purchase_record(product_id).await.as_ref())
    }

    pub fn purchased_product_ids(&self) -> Vec<ProductId> {
        self.store.purchased_product_ids()
    }
}

fn store_customer(cache: &CustomerCache, info: CustomerInfo) {
    *cache.write().unwrap_or_else(PoisonError::into_inner) = Some(info);
}

/// Cache `info` unless the cached copy has seen more recent purchases. A
/// purchase result can land after a fresher `customer_info()` answer.
fn store_customer_if_newer(cache: &CustomerCache, info: CustomerInfo) {
    let mut cached = cache.write().unwrap_or_else(PoisonError::into_inner);
    let keep_cached = cached
        .as_ref()
        .is_some_and(|current| !info.is_at_least_as_recent_as(current));
    if keep_cached {
        debug!("cached customer info is newer than the purchase result; keeping it");
        return;
    }
    *cached = Some(info);
}
