use axum::{
    extract::Query,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Extension, Router,
};
use hyper::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::observability::metrics;
use crate::pipeline::{FilterOptions, HeatmapFrame, HeatmapPipeline, ViewParams};

/// Health check endpoint
async fn health(Extension(pipeline): Extension<Arc<HeatmapPipeline>>) -> impl IntoResponse {
    let dataset = pipeline.dataset();
    Json(serde_json::json!({
        "status": "healthy",
        "service": "account-heatmap",
        "version": env!("CARGO_PKG_VERSION"),
        "installations": dataset.installations.len(),
        "opportunities": dataset.opportunities.len(),
        "loaded_at": dataset.loaded_at,
    }))
}

async fn heatmap(
    Extension(pipeline): Extension<Arc<HeatmapPipeline>>,
    Query(params): Query<ViewParams>,
) -> Json<HeatmapFrame> {
    Json(pipeline.run(&params))
}

async fn options(Extension(pipeline): Extension<Arc<HeatmapPipeline>>) -> Json<FilterOptions> {
    Json(pipeline.options())
}

async fn prometheus_metrics() -> impl IntoResponse {
    match metrics::render() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Create the HTTP router with all routes
pub fn create_server(pipeline: Arc<HeatmapPipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/heatmap", get(heatmap))
        .route("/api/options", get(options))
        .route("/metrics", get(prometheus_metrics))
        .layer(Extension(pipeline))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(
    pipeline: Arc<HeatmapPipeline>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_server(pipeline);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "HTTP server listening");
    println!("🚀 Heatmap server running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");
    println!("🗺️  Heatmap:      http://localhost:{port}/api/heatmap");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
