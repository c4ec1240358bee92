//! Infrastructure layer: state store, provider boundary, orchestration, config.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod projections;
pub mod provider;
pub mod state_store;

pub use config::{ConfigError, SandboxConfig, StoreConfig};
pub use error::StoreError;
pub use orchestrator::{OrchestratorSettings, PurchaseOrchestrator};
pub use projections::PurchasedProducts;
pub use provider::{ProviderError, ProviderPurchase, PurchaseProvider, SandboxOutcome, SandboxProvider};
pub use state_store::{PurchaseStateStore, StateEnvelope};
