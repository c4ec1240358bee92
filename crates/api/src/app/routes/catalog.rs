use std::sync::Arc;

use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(current_offerings))
        .route("/refresh", post(refresh_offerings))
}

/// GET /offerings
///
/// Whatever the cache holds; never calls the provider.
pub async fn current_offerings(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let snapshot = services.orchestrator().offerings();
    Json(dto::CatalogResponse::from(snapshot.as_ref())).into_response()
}

/// POST /offerings/refresh
pub async fn refresh_offerings(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.orchestrator().refresh().await {
        Ok(snapshot) => Json(dto::CatalogResponse::from(snapshot.as_ref())).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
