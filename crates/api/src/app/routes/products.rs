use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use stocktill_core::{ExpectedVersion, ProductId};
use stocktill_infra::reports;
use stocktill_products::{Product, ProductDraft, ProductPatch};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/low-stock", get(low_stock))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(draft): Json<ProductDraft>,
) -> axum::response::Response {
    let product = match draft.into_product(ProductId::new(), Utc::now()) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store().insert_product(product) {
        Ok(stored) => (StatusCode::CREATED, Json(stored.product)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.store().list_products() {
        Ok(products) => {
            let products: Vec<Product> = products.into_iter().map(|s| s.product).collect();
            Json(products).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };

    match services.store().product(product_id) {
        Ok(Some(stored)) => Json(stored.product).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(patch): Json<ProductPatch>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };

    let stored = match services.store().product(product_id) {
        Ok(Some(stored)) => stored,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found");
        }
        Err(e) => return errors::store_error_to_response(e),
    };

    let updated = match patch.apply(stored.product) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .store()
        .update_product(updated, ExpectedVersion::Exact(stored.version))
    {
        Ok(stored) => Json(stored.product).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };

    match services.store().remove_product(product_id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match reports::low_stock(services.store().as_ref()) {
        Ok(products) => {
            let products: Vec<Product> = products.into_iter().map(|s| s.product).collect();
            Json(products).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
