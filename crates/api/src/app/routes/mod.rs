use axum::{routing::get, Router};

pub mod catalog;
pub mod products;
pub mod purchases;
pub mod system;

/// Router for every storefront endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .route("/stream", get(system::stream))
        .nest("/offerings", catalog::router())
        .nest("/products", products::router())
        .nest("/purchases", purchases::router())
}
