use chrono::{DateTime, Utc};
use serde::Serialize;

use storefront_catalog::{CatalogSnapshot, Offering, ProductCategory};
use storefront_core::ProductId;
use storefront_purchasing::{ProductPurchase, PurchaseRecord, PurchaseState};

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct OfferingDto {
    pub product_id: ProductId,
    pub display_name: String,
    pub description: String,
    pub localized_price: String,
    pub category: ProductCategory,
    pub entitlement_id: String,
}

impl From<&Offering> for OfferingDto {
    fn from(offering: &Offering) -> Self {
        Self {
            product_id: offering.product_id().clone(),
            display_name: offering.display_name().to_string(),
            description: offering.description().to_string(),
            localized_price: offering.localized_price().to_string(),
            category: offering.category(),
            entitlement_id: storefront_catalog::entitlement_id(offering.product_id()).into_inner(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub revision: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub offerings: Vec<OfferingDto>,
}

impl From<&CatalogSnapshot> for CatalogResponse {
    fn from(snapshot: &CatalogSnapshot) -> Self {
        Self {
            revision: snapshot.revision(),
            refreshed_at: snapshot.refreshed_at(),
            offerings: snapshot.offerings().iter().map(OfferingDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub product_id: ProductId,
    pub state: PurchaseState,
    /// Why the last attempt ended the way it did (failures only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StateResponse {
    /// Untracked products are reported as `unknown`.
    pub fn new(product_id: ProductId, purchase: Option<&ProductPurchase>) -> Self {
        match purchase {
            Some(purchase) => Self {
                product_id,
                state: purchase.state(),
                reason: purchase.last_reason().map(str::to_string),
                attempts: purchase.attempts(),
                updated_at: purchase.updated_at(),
            },
            None => Self {
                product_id,
                state: PurchaseState::Unknown,
                reason: None,
                attempts: 0,
                updated_at: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub product_id: ProductId,
    pub purchased: bool,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<PurchaseRecord>,
}

#[derive(Debug, Serialize)]
pub struct PurchasesResponse {
    /// Purchased during this process, in first-purchase order.
    pub purchased: Vec<ProductId>,
    pub states: Vec<StateResponse>,
}
