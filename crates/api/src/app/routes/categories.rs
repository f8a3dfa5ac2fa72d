use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;

use stocktill_core::CategoryId;
use stocktill_products::CategoryDraft;

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_category).get(list_categories))
        .route("/:id", axum::routing::delete(delete_category))
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Json(draft): Json<CategoryDraft>,
) -> axum::response::Response {
    let category = match draft.into_category(CategoryId::new(), Utc::now()) {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store().insert_category(category.clone()) {
        Ok(()) => (StatusCode::CREATED, Json(category)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.store().list_categories() {
        Ok(categories) => Json(categories).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let category_id: CategoryId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid category id");
        }
    };

    match services.store().remove_category(category_id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "category not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}
