use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};

use crate::app::dto;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/", get(list_purchases))
}

/// GET /purchases
pub async fn list_purchases(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let orchestrator = services.orchestrator();
    let store = services.store();
    let states = store
        .snapshot()
        .into_keys()
        .map(|product_id| {
            let purchase = store.purchase(&product_id);
            dto::StateResponse::new(product_id, purchase.as_ref())
        })
        .collect();

    Json(dto::PurchasesResponse {
        purchased: orchestrator.purchased_product_ids(),
        states,
    })
    .into_response()
}
