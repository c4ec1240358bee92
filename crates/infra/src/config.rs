//! Configuration loading and representation.
//!
//! Configuration is a JSON file (path from `STOREFRONT_CONFIG`, default
//! `storefront.json`) with a few environment overrides on top.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_catalog::StoreProduct;
use storefront_core::ProductId;

use crate::provider::SandboxOutcome;

pub const CONFIG_PATH_VAR: &str = "STOREFRONT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "storefront.json";

const API_KEY_VAR: &str = "STOREFRONT_API_KEY";
const BIND_ADDR_VAR: &str = "STOREFRONT_BIND_ADDR";
const PURCHASE_TIMEOUT_VAR: &str = "STOREFRONT_PURCHASE_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {message}")]
    Read { path: String, message: String },

    #[error("malformed configuration: {0}")]
    Parse(String),

    #[error("product list is empty")]
    EmptyProductList,

    #[error("api key is missing")]
    MissingApiKey,

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Sandbox provider setup (products it offers, scripted outcomes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default)]
    pub products: Vec<StoreProduct>,
    #[serde(default = "default_true")]
    pub payments_allowed: bool,
    #[serde(default)]
    pub outcomes: HashMap<ProductId, SandboxOutcome>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            products: Vec::new(),
            payments_allowed: true,
            outcomes: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Products the app sells, in display order.
    pub products: Vec<ProductId>,
    #[serde(default)]
    pub api_key: String,
    /// Provider offering to load as the current catalog.
    #[serde(default = "default_offering_id")]
    pub offering_id: String,
    #[serde(default = "default_purchase_timeout_secs")]
    pub purchase_timeout_secs: u64,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SandboxConfig>,
}

fn default_true() -> bool {
    true
}

fn default_offering_id() -> String {
    "default".to_string()
}

fn default_purchase_timeout_secs() -> u64 {
    60
}

fn default_query_timeout_secs() -> u64 {
    5
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl StoreConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `env` for every environment lookup.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = env(CONFIG_PATH_VAR).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let mut config: StoreConfig =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.apply_overrides(env)?;
        config.validate()
    }

    /// Parse and validate a JSON document (no environment overrides).
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()
    }

    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(key) = env(API_KEY_VAR) {
            self.api_key = key;
        }
        if let Some(addr) = env(BIND_ADDR_VAR) {
            self.bind_addr = addr;
        }
        if let Some(raw) = env(PURCHASE_TIMEOUT_VAR) {
            self.purchase_timeout_secs = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: PURCHASE_TIMEOUT_VAR.to_string(),
                value: raw.clone(),
            })?;
        }
        Ok(())
    }

    /// De-duplicate the product list (first occurrence wins) and check the
    /// required fields.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let mut seen = Vec::with_capacity(self.products.len());
        for product in self.products.drain(..) {
            if !product.as_str().trim().is_empty() && !seen.contains(&product) {
                seen.push(product);
            }
        }
        self.products = seen;

        if self.products.is_empty() {
            return Err(ConfigError::EmptyProductList);
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.purchase_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "purchase_timeout_secs".into(),
                value: "0".into(),
            });
        }
        if self.query_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "query_timeout_secs".into(),
                value: "0".into(),
            });
        }
        Ok(self)
    }

    pub fn purchase_timeout(&self) -> Duration {
        Duration::from_secs(self.purchase_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "products": [
            "com.example.storefront.nonconsumable.roses.large",
            "com.example.storefront.subscription.vip.gold",
            "com.example.storefront.nonconsumable.roses.large"
        ],
        "api_key": "appl_test"
    }"#;

    #[test]
    fn defaults_are_applied_and_products_deduplicated() {
        let config = StoreConfig::from_json(MINIMAL).unwrap();

        assert_eq!(config.products.len(), 2);
        assert_eq!(config.offering_id, "default");
        assert_eq!(config.purchase_timeout(), Duration::from_secs(60));
        assert_eq!(config.query_timeout(), Duration::from_secs(5));
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(config.sandbox.is_none());
    }

    #[test]
    fn empty_product_list_is_rejected() {
        let err = StoreConfig::from_json(r#"{"products": [], "api_key": "k"}"#).unwrap_err();
        assert_eq!(err, ConfigError::EmptyProductList);
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let err = StoreConfig::from_json(r#"{"products": ["a"]}"#).unwrap_err();
        assert_eq!(err, ConfigError::MissingApiKey);
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = StoreConfig::from_json(MINIMAL).unwrap();
        let env = |key: &str| match key {
            "STOREFRONT_API_KEY" => Some("appl_override".to_string()),
            "STOREFRONT_PURCHASE_TIMEOUT_SECS" => Some("15".to_string()),
            _ => None,
        };

        config.apply_overrides(env).unwrap();
        assert_eq!(config.api_key, "appl_override");
        assert_eq!(config.purchase_timeout_secs, 15);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn bad_timeout_override_is_reported() {
        let mut config = StoreConfig::from_json(MINIMAL).unwrap();
        let err = config
            .apply_overrides(|key| (key == PURCHASE_TIMEOUT_VAR).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = StoreConfig::load_with(|key| {
            (key == CONFIG_PATH_VAR).then(|| "/nonexistent/storefront.json".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn sandbox_section_parses() {
        let raw = r#"{
            "products": ["com.example.storefront.nonconsumable.roses.large"],
            "api_key": "k",
            "sandbox": {
                "products": [{
                    "product_id": "com.example.storefront.nonconsumable.roses.large",
                    "display_name": "Roses",
                    "description": "A dozen roses",
                    "localized_price": "$1.99"
                }],
                "outcomes": {
                    "com.example.storefront.nonconsumable.roses.large": {"kind": "cancel"}
                }
            }
        }"#;

        let config = StoreConfig::from_json(raw).unwrap();
        let sandbox = config.sandbox.unwrap();
        assert!(sandbox.payments_allowed);
        assert_eq!(sandbox.products.len(), 1);
        assert_eq!(sandbox.outcomes.len(), 1);
    }
}
