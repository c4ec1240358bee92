use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use storefront_infra::StoreError;

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Configuration(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "configuration_error", msg)
        }
        StoreError::CatalogFetch(msg) => json_error(StatusCode::BAD_GATEWAY, "catalog_unavailable", msg),
        StoreError::PurchaseRejected(msg) => json_error(StatusCode::CONFLICT, "purchase_cancelled", msg),
        StoreError::PurchaseFailed(msg) => json_error(StatusCode::BAD_GATEWAY, "purchase_failed", msg),
        StoreError::VerificationFailed(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "verification_failed", msg)
        }
        StoreError::ConcurrentPurchaseRejected(msg) => {
            json_error(StatusCode::CONFLICT, "purchase_in_progress", msg)
        }
        StoreError::InvalidTransition(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
