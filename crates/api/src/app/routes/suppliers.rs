use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;

use stocktill_core::SupplierId;
use stocktill_products::SupplierDraft;

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_supplier).get(list_suppliers))
        .route("/:id", axum::routing::delete(delete_supplier))
}

pub async fn create_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Json(draft): Json<SupplierDraft>,
) -> axum::response::Response {
    let supplier = match draft.into_supplier(SupplierId::new(), Utc::now()) {
        Ok(s) => s,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store().insert_supplier(supplier.clone()) {
        Ok(()) => (StatusCode::CREATED, Json(supplier)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.store().list_suppliers() {
        Ok(suppliers) => Json(suppliers).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let supplier_id: SupplierId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid supplier id");
        }
    };

    match services.store().remove_supplier(supplier_id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "supplier not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}
