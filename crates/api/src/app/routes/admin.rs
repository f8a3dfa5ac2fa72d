use std::sync::Arc;

use axum::{Json, Router, extract::Extension, response::IntoResponse, routing::post};

use stocktill_infra::reports;

use crate::app::dto;
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/opening-balances", post(import_opening_balances))
        .route("/reset", post(reset_stock_data))
}

/// One-time ledger bootstrap for products created before movement tracking.
/// Safe to re-run: products with any history are skipped.
pub async fn import_opening_balances(
    Extension(services): Extension<Arc<AppServices>>,
    body: Option<Json<dto::OpeningBalancesRequest>>,
) -> axum::response::Response {
    let actor = body.and_then(|Json(b)| b.user_id);

    match services.engine().import_opening_balances(actor) {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// Bulk data reset: wipes movements and sales, zeroes cached quantities.
pub async fn reset_stock_data(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.store().reset_stock_data() {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match reports::dashboard(services.store().as_ref()) {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
