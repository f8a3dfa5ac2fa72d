use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stocktill_core::{ProductId, SaleId};
use stocktill_sales::{SaleDraft, SaleLine};

use crate::app::dto;
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_sale).get(list_sales))
        .route("/:id", get(get_sale))
}

pub async fn create_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateSaleRequest>,
) -> axum::response::Response {
    let mut lines = Vec::with_capacity(body.lines.len());
    for (idx, line) in body.lines.iter().enumerate() {
        let product_id: ProductId = match line.product_id.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    format!("line {}: invalid product id", idx + 1),
                );
            }
        };
        lines.push(SaleLine {
            product_id,
            quantity: line.quantity,
            unit_price_cents: line.unit_price_cents,
        });
    }

    let draft = SaleDraft {
        lines,
        cashier: body.cashier,
    };

    match services.engine().process_sale(draft) {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.store().sales() {
        Ok(sales) => Json(sales).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let sale_id: SaleId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid sale id");
        }
    };

    match services.store().sale(sale_id) {
        Ok(Some(sale)) => Json(sale).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "sale not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}
