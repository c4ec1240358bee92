use serde::{Deserialize, Serialize};

use storefront_core::ProductId;

/// Product category lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    /// One-time purchase that never expires.
    NonConsumable,
    /// Recurring purchase with renewal/expiration semantics.
    Subscription,
}

/// A product as described by the commerce provider's catalog.
///
/// `subscription_group` is the provider's marker for auto-renewing products;
/// its presence is the only thing that decides the category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreProduct {
    pub product_id: ProductId,
    pub display_name: String,
    pub description: String,
    pub localized_price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_group: Option<String>,
}

/// A purchasable offering, as shown to the user.
///
/// Offerings are immutable; a catalog refresh replaces all of them at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    product_id: ProductId,
    display_name: String,
    description: String,
    localized_price: String,
    category: ProductCategory,
}

impl Offering {
    pub fn new(
        product_id: ProductId,
        display_name: impl Into<String>,
        description: impl Into<String>,
        localized_price: impl Into<String>,
        category: ProductCategory,
    ) -> Self {
        Self {
            product_id,
            display_name: display_name.into(),
            description: description.into(),
            localized_price: localized_price.into(),
            category,
        }
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn localized_price(&self) -> &str {
        &self.localized_price
    }

    pub fn category(&self) -> ProductCategory {
        self.category
    }

    pub fn is_subscription(&self) -> bool {
        self.category == ProductCategory::Subscription
    }
}

impl From<StoreProduct> for Offering {
    fn from(product: StoreProduct) -> Self {
        let category = if product.subscription_group.is_some() {
            ProductCategory::Subscription
        } else {
            ProductCategory::NonConsumable
        };

        Self {
            product_id: product.product_id,
            display_name: product.display_name,
            description: product.description,
            localized_price: product.localized_price,
            category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_product(id: &str, group: Option<&str>) -> StoreProduct {
        StoreProduct {
            product_id: ProductId::new(id),
            display_name: "Roses".to_string(),
            description: "A dozen red roses".to_string(),
            localized_price: "$1.99".to_string(),
            subscription_group: group.map(str::to_string),
        }
    }

    #[test]
    fn category_follows_subscription_group_marker() {
        let plain = Offering::from(store_product("a", None));
        assert_eq!(plain.category(), ProductCategory::NonConsumable);

        // Identifier naming plays no role: only the marker counts.
        let sub = Offering::from(store_product("com.example.nonconsumable.x", Some("vip")));
        assert_eq!(sub.category(), ProductCategory::Subscription);
        assert!(sub.is_subscription());
    }

    #[test]
    fn store_product_deserializes_without_group() {
        let json = r#"{
            "product_id": "a",
            "display_name": "Roses",
            "description": "A dozen red roses",
            "localized_price": "$1.99"
        }"#;
        let product: StoreProduct = serde_json::from_str(json).unwrap();
        assert!(product.subscription_group.is_none());
    }
}
