use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stocktill_core::DomainError;
use stocktill_infra::engine::EngineError;
use stocktill_infra::store::StoreError;
use stocktill_inventory::StockError;

/// Map a balance-engine failure to a response.
///
/// Stock and sale validation failures are ordinary user-facing errors (400
/// with the human-readable message); only backend faults become 5xx.
pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::Stock(StockError::ProductNotFound { .. }) => {
            json_error(StatusCode::NOT_FOUND, "not_found", "product not found")
        }
        EngineError::Stock(e) => json_error(StatusCode::BAD_REQUEST, "stock_error", e.to_string()),
        EngineError::Sale(e) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        }
        EngineError::Contention => json_error(
            StatusCode::CONFLICT,
            "conflict",
            "the product is being updated concurrently; please retry",
        ),
        EngineError::Store(e) => store_error_to_response(e),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::ProductNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", "product not found")
        }
        StoreError::DuplicateSku(sku) => json_error(
            StatusCode::CONFLICT,
            "duplicate_sku",
            format!("sku '{sku}' is already in use"),
        ),
        StoreError::InvalidCommit(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        StoreError::Backend(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
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
