//! Strongly-typed identifiers used across the domain.
//!
//! All identifiers are opaque strings issued by the commerce provider. They are
//! never generated locally.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a purchasable product (provider catalog namespace).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

/// Identifier of an entitlement (provider entitlement namespace).
///
/// The empty value is a sentinel meaning "no entitlement": it is what the
/// entitlement table returns for products it does not know.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntitlementId(String);

/// Identifier of a provider transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

macro_rules! impl_string_newtype {
    ($t:ty) => {
        impl $t {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

impl_string_newtype!(ProductId);
impl_string_newtype!(EntitlementId);
impl_string_newtype!(TransactionId);

impl ProductId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl FromStr for ProductId {
    type Err = DomainError;

    /// Parse untrusted input (e.g. a URL path segment). Surrounding whitespace
    /// is trimmed; an empty identifier is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_id("ProductId: empty"));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl EntitlementId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The "no entitlement" sentinel.
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TransactionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_id_parse_trims_and_rejects_empty() {
        let id: ProductId = "  com.example.item ".parse().unwrap();
        assert_eq!(id.as_str(), "com.example.item");

        let err = "   ".parse::<ProductId>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(_)));
    }

    #[test]
    fn entitlement_sentinel_is_empty() {
        assert!(EntitlementId::empty().is_empty());
        assert_eq!(EntitlementId::default(), EntitlementId::empty());
        assert!(!EntitlementId::new("VIP_Gold_Features").is_empty());
    }

    #[test]
    fn identifiers_serialize_transparently() {
        let id = ProductId::new("com.example.item");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"com.example.item\"");

        let back: ProductId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
