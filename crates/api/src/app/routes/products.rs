use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use storefront_core::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:id/state", get(get_state))
        .route("/:id/purchase", post(purchase_product))
        .route("/:id/info", get(get_info))
}

fn parse_product_id(raw: &str) -> Result<ProductId, axum::response::Response> {
    raw.parse::<ProductId>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

pub async fn get_state(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let purchase = services.store().purchase(&product_id);
    Json(dto::StateResponse::new(product_id, purchase.as_ref())).into_response()
}

/// POST /products/:id/purchase
///
/// Answers once the attempt has settled; the body carries the final state.
pub async fn purchase_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.orchestrator().purchase(&product_id).await {
        Ok(_) => {
            let purchase = services.store().purchase(&product_id);
            Json(dto::StateResponse::new(product_id, purchase.as_ref())).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_info(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let orchestrator = services.orchestrator();
    let purchased = orchestrator.is_purchased(&product_id).await;
    let record = orchestrator.purchase_record(&product_id).await;
    let text = storefront_purchasing::purchase_info_text(record.as_ref());

    Json(dto::InfoResponse {
        product_id,
        purchased,
        text,
        record,
    })
    .into_response()
}
