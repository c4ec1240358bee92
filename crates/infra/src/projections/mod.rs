//! Read models folded from purchase events.

mod purchased_products;

pub use purchased_products::PurchasedProducts;
