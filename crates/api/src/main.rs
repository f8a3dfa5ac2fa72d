#[tokio::main]
async fn main() {
    stocktill_observability::init();

    let app = stocktill_api::app::build_app().await;

    let addr =
        std::env::var("STOCKTILL_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));

    tracing::info!("listening on {}", addr);

    axum::serve(listener, app).await.expect("server error");
}
