use axum::{Router, routing::get};

pub mod admin;
pub mod categories;
pub mod ledger;
pub mod products;
pub mod sales;
pub mod suppliers;
pub mod system;

/// Router for all application endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router().merge(ledger::router()))
        .nest("/categories", categories::router())
        .nest("/suppliers", suppliers::router())
        .nest("/sales", sales::router())
        .nest("/admin", admin::router())
        .route("/dashboard", get(admin::dashboard))
}
