mod handlers;

use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::geocoding::GeocodingClient;

pub use handlers::status_for;

pub fn build_router(client: GeocodingClient) -> Router {
    Router::new()
        .route("/api/geocode", get(handlers::geocode))
        .route("/api/reverse", get(handlers::reverse))
        .route("/api/autocomplete", get(handlers::autocomplete))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(client))
}

pub async fn start(client: GeocodingClient, host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(client);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "geocoder server listening");
    axum::serve(listener, app).await
}
