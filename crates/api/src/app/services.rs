//! Service wiring: provider, state store, and orchestrator behind one handle.

use std::sync::Arc;

use tracing::{info, warn};

use storefront_infra::{
    ConfigError, OrchestratorSettings, PurchaseOrchestrator, PurchaseProvider, PurchaseStateStore,
    SandboxProvider, StoreConfig,
};

/// Shared state handed to every handler through an `Extension`.
#[derive(Debug)]
pub struct AppServices {
    orchestrator: Arc<PurchaseOrchestrator>,
}

impl AppServices {
    pub fn new(orchestrator: Arc<PurchaseOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Arc<PurchaseOrchestrator> {
        &self.orchestrator
    }

    pub fn store(&self) -> &Arc<PurchaseStateStore> {
        self.orchestrator.store()
    }
}

/// Wire services from a configuration load result.
///
/// A configuration error does not stop the process: the services come up with
/// no products and every refresh reports the error.
pub fn build_services(config: &Result<StoreConfig, ConfigError>) -> Arc<AppServices> {
    let store = Arc::new(PurchaseStateStore::new());

    let (provider, settings): (Arc<dyn PurchaseProvider>, OrchestratorSettings) = match config {
        Ok(config) => {
            let settings = OrchestratorSettings::from(config);
            let provider = match &config.sandbox {
                Some(sandbox) => SandboxProvider::from_config(&config.offering_id, sandbox),
                None => {
                    warn!("no provider section configured; sandbox provider offers nothing");
                    SandboxProvider::new()
                }
            };
            info!(
                products = settings.products.len(),
                offering_id = %settings.offering_id,
                "services configured"
            );
            (Arc::new(provider), settings)
        }
        Err(e) => {
            warn!(error = %e, "starting without a usable configuration");
            (
                Arc::new(SandboxProvider::new()),
                OrchestratorSettings::degraded(e.to_string()),
            )
        }
    };

    let orchestrator = Arc::new(PurchaseOrchestrator::new(provider, store, settings));
    Arc::new(AppServices::new(orchestrator))
}
