//! Product catalog cache (immutable snapshots, whole-list replacement).

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use storefront_core::ProductId;

use crate::offering::{Offering, ProductCategory};

/// One complete, immutable view of the catalog.
///
/// A snapshot is never modified after construction. Readers that hold an
/// `Arc<CatalogSnapshot>` keep a consistent view even while a refresh installs
/// a newer one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogSnapshot {
    offerings: Vec<Offering>,
    revision: u64,
    refreshed_at: Option<DateTime<Utc>>,
}

impl CatalogSnapshot {
    /// Number of successful refreshes that produced this snapshot (0 = never).
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn offerings(&self) -> &[Offering] {
        &self.offerings
    }

    pub fn is_empty(&self) -> bool {
        self.offerings.is_empty()
    }

    pub fn offering(&self, product_id: &ProductId) -> Option<&Offering> {
        self.offerings.iter().find(|o| o.product_id() == product_id)
    }

    pub fn category(&self, product_id: &ProductId) -> Option<ProductCategory> {
        self.offering(product_id).map(Offering::category)
    }

    /// Localized price for a product, if it is currently offered.
    pub fn price(&self, product_id: &ProductId) -> Option<&str> {
        self.offering(product_id).map(Offering::localized_price)
    }

    pub fn non_consumables(&self) -> impl Iterator<Item = &Offering> {
        self.by_category(ProductCategory::NonConsumable)
    }

    pub fn subscriptions(&self) -> impl Iterator<Item = &Offering> {
        self.by_category(ProductCategory::Subscription)
    }

    fn by_category(&self, category: ProductCategory) -> impl Iterator<Item = &Offering> {
        self.offerings
            .iter()
            .filter(move |o| o.category() == category)
    }
}

/// Process-wide catalog cache.
///
/// The only mutator is [`CatalogCache::replace`], called by the refresh
/// routine after a successful provider fetch. Everything else reads snapshots.
#[derive(Debug, Default)]
pub struct CatalogCache {
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest snapshot (empty, revision 0, if never refreshed).
    pub fn current_offerings(&self) -> Arc<CatalogSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Atomically install a new full list of offerings.
    ///
    /// Duplicate product identifiers keep their first occurrence. Returns the
    /// installed snapshot.
    pub fn replace(&self, offerings: Vec<Offering>) -> Arc<CatalogSnapshot> {
        let mut unique: Vec<Offering> = Vec::with_capacity(offerings.len());
        for offering in offerings {
            if !unique.iter().any(|o| o.product_id() == offering.product_id()) {
                unique.push(offering);
            }
        }

        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(CatalogSnapshot {
            offerings: unique,
            revision: guard.revision + 1,
            refreshed_at: Some(Utc::now()),
        });
        *guard = next.clone();
        next
    }

    pub fn has_offerings(&self) -> bool {
        !self.current_offerings().is_empty()
    }

    pub fn offering(&self, product_id: &ProductId) -> Option<Offering> {
        self.current_offerings().offering(product_id).cloned()
    }

    pub fn category(&self, product_id: &ProductId) -> Option<ProductCategory> {
        self.current_offerings().category(product_id)
    }

    pub fn price(&self, product_id: &ProductId) -> Option<String> {
        self.current_offerings().price(product_id).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn offering(id: &str, category: ProductCategory) -> Offering {
        Offering::new(ProductId::new(id), id, "", "$1.99", category)
    }

    #[test]
    fn empty_before_first_refresh() {
        let cache = CatalogCache::new();
        let snapshot = cache.current_offerings();

        assert!(snapshot.is_empty());
        assert_eq!(snapshot.revision(), 0);
        assert!(snapshot.refreshed_at().is_none());
        assert!(!cache.has_offerings());
    }

    #[test]
    fn replace_swaps_whole_list() {
        let cache = CatalogCache::new();
        cache.replace(vec![
            offering("a", ProductCategory::NonConsumable),
            offering("b", ProductCategory::Subscription),
        ]);
        let old = cache.current_offerings();

        cache.replace(vec![offering("c", ProductCategory::NonConsumable)]);
        let new = cache.current_offerings();

        // Held snapshot unchanged; new snapshot has nothing merged from the old one.
        assert_eq!(old.offerings().len(), 2);
        assert_eq!(new.offerings().len(), 1);
        assert!(new.offering(&ProductId::new("a")).is_none());
        assert_eq!(new.revision(), 2);
    }

    #[test]
    fn category_helpers_split_offerings() {
        let cache = CatalogCache::new();
        let snapshot = cache.replace(vec![
            offering("a", ProductCategory::NonConsumable),
            offering("b", ProductCategory::Subscription),
            offering("a", ProductCategory::Subscription),
        ]);

        assert_eq!(snapshot.offerings().len(), 2);
        assert_eq!(snapshot.non_consumables().count(), 1);
        assert_eq!(snapshot.subscriptions().count(), 1);
        assert_eq!(
            cache.category(&ProductId::new("a")),
            Some(ProductCategory::NonConsumable)
        );
        assert_eq!(cache.price(&ProductId::new("b")).as_deref(), Some("$1.99"));
        assert_eq!(cache.price(&ProductId::new("zzz")), None);
    }

    #[test]
    fn readers_never_observe_a_mixed_catalog() {
        let cache = Arc::new(CatalogCache::new());
        let generation = |g: u32| -> Vec<Offering> {
            (0..8)
                .map(|i| {
                    Offering::new(
                        ProductId::new(format!("p{i}")),
                        format!("gen-{g}"),
                        "",
                        "$1.00",
                        ProductCategory::NonConsumable,
                    )
                })
                .collect()
        };
        cache.replace(generation(0));

        let writer = {
            let cache = cache.clone();
            thread::spawn(move || {
                for g in 1..200 {
                    cache.replace(generation(g));
                }
            })
        };

        for _ in 0..2_000 {
            let snapshot = cache.current_offerings();
            let first = snapshot.offerings()[0].display_name().to_string();
            assert!(
                snapshot.offerings().iter().all(|o| o.display_name() == first),
                "snapshot mixed offerings from different refreshes"
            );
        }

        writer.join().unwrap();
    }
}
