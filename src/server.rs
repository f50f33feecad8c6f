//! HTTP surface: `/metrics`, `/health` and a redirect from `/`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{error, info};

use crate::error::ExporterError;
use crate::exporter::Exporter;

pub const METRICS_PATH: &str = "/metrics";
pub const HEALTH_PATH: &str = "/health";

impl IntoResponse for ExporterError {
    fn into_response(self) -> Response {
        error!(error = %self, "failed to serve metrics");
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
    }
}

pub fn build_router(exporter: Arc<Exporter>) -> Router {
    Router::new()
        .route("/", get(root_redirect))
        .route(METRICS_PATH, get(metrics_handler))
        .route(HEALTH_PATH, get(health_handler))
        .with_state(exporter)
}

async fn metrics_handler(State(exporter): State<Arc<Exporter>>) -> Result<Response, ExporterError> {
    let body = exporter.render().await?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response())
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}

async fn root_redirect() -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, METRICS_PATH)])
}

/// Bind `0.0.0.0:{port}` and serve until Ctrl-C.
pub async fn serve(exporter: Arc<Exporter>, port: u16) -> Result<(), ExporterError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "typesense-exporter listening");

    axum::serve(listener, build_router(exporter))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
