use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stocktill_core::ProductId;
use stocktill_inventory::{MovementKind, MovementRequest, SortOrder};

use crate::app::dto;
use crate::app::errors;
use crate::app::services::AppServices;

/// Stock-ledger routes, mounted under the `/products` prefix.
pub fn router() -> Router {
    Router::new()
        .route("/:id/movements", post(record_movement))
        .route("/:id/ledger", get(get_ledger))
        .route("/:id/ledger/summary", get(get_summary))
}

pub async fn record_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordMovementRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };

    // Unknown type strings fail here, before any stock logic runs.
    let kind: MovementKind = match body.kind.parse() {
        Ok(kind) => kind,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "stock_error", e.to_string());
        }
    };

    let request = MovementRequest {
        kind,
        quantity: body.quantity,
        reason: body.reason,
        reference: body.reference,
        actor: body.user_id,
        occurred_at: body.occurred_at,
    };

    match services.engine().apply_movement(product_id, request) {
        Ok(applied) => (StatusCode::CREATED, Json(applied)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::LedgerQuery>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };

    // The ledger page shows newest first unless asked otherwise.
    let order = match query.order.as_deref() {
        None | Some("desc") => SortOrder::Descending,
        Some("asc") => SortOrder::Ascending,
        Some(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "order must be 'asc' or 'desc'",
            );
        }
    };

    match services.engine().ledger(product_id, order) {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::SummaryQuery>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };

    if let Some(month) = query.month {
        if !(1..=12).contains(&month) {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "month must be between 1 and 12",
            );
        }
    }

    match services
        .engine()
        .period_summary(product_id, query.year, query.month)
    {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
