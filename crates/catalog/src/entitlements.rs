//! Mapping between products and provider entitlements.
//!
//! The product → entitlement table is static and total: unknown products map
//! to the empty [`EntitlementId`] sentinel, never to an error. Categories are
//! not derived from identifiers; they come from the last catalog snapshot.

use std::sync::Arc;

use storefront_core::{EntitlementId, ProductId};

use crate::cache::CatalogCache;
use crate::offering::ProductCategory;

/// Entitlements configured on the provider dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreEntitlement {
    VipGold,
    VipSilver,
    VipBronze,
    /// Shared by every non-consumable product.
    UnrestrictedOwnership,
}

const ENTITLEMENT_TABLE: &[(&str, StoreEntitlement)] = &[
    (
        "com.example.storefront.subscription.vip.gold",
        StoreEntitlement::VipGold,
    ),
    (
        "com.example.storefront.subscription.vip.silver",
        StoreEntitlement::VipSilver,
    ),
    (
        "com.example.storefront.subscription.vip.bronze",
        StoreEntitlement::VipBronze,
    ),
    (
        "com.example.storefront.nonconsumable.flowers.large",
        StoreEntitlement::UnrestrictedOwnership,
    ),
    (
        "com.example.storefront.nonconsumable.flowers.small",
        StoreEntitlement::UnrestrictedOwnership,
    ),
    (
        "com.example.storefront.nonconsumable.roses.large",
        StoreEntitlement::UnrestrictedOwnership,
    ),
    (
        "com.example.storefront.nonconsumable.chocolates.small",
        StoreEntitlement::UnrestrictedOwnership,
    ),
];

impl StoreEntitlement {
    pub const ALL: [StoreEntitlement; 4] = [
        StoreEntitlement::VipGold,
        StoreEntitlement::VipSilver,
        StoreEntitlement::VipBronze,
        StoreEntitlement::UnrestrictedOwnership,
    ];

    /// Provider-side entitlement identifier.
    pub fn id_str(self) -> &'static str {
        match self {
            StoreEntitlement::VipGold => "VIP_Gold_Features",
            StoreEntitlement::VipSilver => "VIP_Silver_Features",
            StoreEntitlement::VipBronze => "VIP_Bronze_Features",
            StoreEntitlement::UnrestrictedOwnership => "Unrestricted_Ownership",
        }
    }

    pub fn id(self) -> EntitlementId {
        EntitlementId::new(self.id_str())
    }

    /// Products that unlock this entitlement.
    pub fn product_ids(self) -> Vec<ProductId> {
        ENTITLEMENT_TABLE
            .iter()
            .filter(|(_, e)| *e == self)
            .map(|(p, _)| ProductId::new(*p))
            .collect()
    }

    pub fn for_product(product_id: &ProductId) -> Option<StoreEntitlement> {
        ENTITLEMENT_TABLE
            .iter()
            .find(|(p, _)| *p == product_id.as_str())
            .map(|(_, e)| *e)
    }
}

/// Entitlement identifier for a product (empty sentinel when unmapped).
pub fn entitlement_id(product_id: &ProductId) -> EntitlementId {
    StoreEntitlement::for_product(product_id)
        .map(StoreEntitlement::id)
        .unwrap_or_else(EntitlementId::empty)
}

/// Entitlement table + catalog-backed category lookups.
///
/// Category predicates use a closed-world view of the cached catalog: a
/// product that never appeared in a snapshot is neither a subscription nor a
/// non-consumable.
#[derive(Debug, Clone)]
pub struct EntitlementMapper {
    catalog: Arc<CatalogCache>,
}

impl EntitlementMapper {
    pub fn new(catalog: Arc<CatalogCache>) -> Self {
        Self { catalog }
    }

    pub fn entitlement_id(&self, product_id: &ProductId) -> EntitlementId {
        entitlement_id(product_id)
    }

    pub fn category(&self, product_id: &ProductId) -> Option<ProductCategory> {
        self.catalog.category(product_id)
    }

    pub fn is_subscription(&self, product_id: &ProductId) -> bool {
        self.category(product_id) == Some(ProductCategory::Subscription)
    }

    pub fn is_non_consumable(&self, product_id: &ProductId) -> bool {
        self.category(product_id) == Some(ProductCategory::NonConsumable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offering::Offering;

    #[test]
    fn known_products_map_to_their_entitlement() {
        let gold = ProductId::new("com.example.storefront.subscription.vip.gold");
        assert_eq!(entitlement_id(&gold).as_str(), "VIP_Gold_Features");

        let roses = ProductId::new("com.example.storefront.nonconsumable.roses.large");
        assert_eq!(entitlement_id(&roses).as_str(), "Unrestricted_Ownership");
    }

    #[test]
    fn reverse_lookup_covers_table() {
        let total: usize = StoreEntitlement::ALL
            .iter()
            .map(|e| e.product_ids().len())
            .sum();
        assert_eq!(total, ENTITLEMENT_TABLE.len());
        assert_eq!(StoreEntitlement::UnrestrictedOwnership.product_ids().len(), 4);

        for e in StoreEntitlement::ALL {
            for p in e.product_ids() {
                assert_eq!(entitlement_id(&p), e.id());
            }
        }
    }

    #[test]
    fn unknown_product_is_neither_category() {
        let mapper = EntitlementMapper::new(Arc::new(CatalogCache::new()));
        let unknown = ProductId::new("com.example.storefront.subscription.vip.platinum");

        assert!(mapper.entitlement_id(&unknown).is_empty());
        assert!(!mapper.is_subscription(&unknown));
        assert!(!mapper.is_non_consumable(&unknown));
    }

    #[test]
    fn predicates_follow_catalog_not_naming() {
        let catalog = Arc::new(CatalogCache::new());
        let mapper = EntitlementMapper::new(catalog.clone());
        // Mapped as a subscription entitlement, but the catalog says otherwise.
        let gold = ProductId::new("com.example.storefront.subscription.vip.gold");
        assert!(!mapper.is_subscription(&gold));

        catalog.replace(vec![Offering::new(
            gold.clone(),
            "Gold",
            "",
            "$9.99",
            ProductCategory::NonConsumable,
        )]);
        assert!(mapper.is_non_consumable(&gold));
        assert!(!mapper.is_subscription(&gold));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: the mapping is deterministic.
            #[test]
            fn entitlement_id_is_deterministic(raw in "[a-z.]{0,60}") {
                let id = ProductId::new(raw);
                prop_assert_eq!(entitlement_id(&id), entitlement_id(&id));
            }

            /// Property: identifiers outside the table map to the empty sentinel.
            #[test]
            fn unmapped_ids_yield_empty_sentinel(raw in "[a-z]{1,12}\\.[a-z]{1,12}") {
                let id = ProductId::new(raw);
                prop_assume!(StoreEntitlement::for_product(&id).is_none());

                let mapper = EntitlementMapper::new(Arc::new(CatalogCache::new()));
                prop_assert!(entitlement_id(&id).is_empty());
                prop_assert!(!mapper.is_subscription(&id));
                prop_assert!(!mapper.is_non_consumable(&id));
            }
        }
    }
}
