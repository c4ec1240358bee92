//! Catalog module: purchasable offerings and the entitlement table.
//!
//! This crate contains pure, deterministic logic (no IO, no provider calls):
//! the offering model, the snapshot cache that readers consult, and the static
//! mapping from products to provider entitlements.

pub mod cache;
pub mod entitlements;
pub mod offering;

pub use cache::{CatalogCache, CatalogSnapshot};
pub use entitlements::{EntitlementMapper, StoreEntitlement, entitlement_id};
pub use offering::{Offering, ProductCategory, StoreProduct};
