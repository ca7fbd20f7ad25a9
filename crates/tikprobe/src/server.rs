// ── Scrape endpoint ──

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::metrics::PrometheusSink;

pub fn build_router(sink: Arc<PrometheusSink>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/health", get(|| async { "ok" }))
        .with_state(sink)
}

async fn metrics(State(sink): State<Arc<PrometheusSink>>) -> Response {
    match sink.render() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Serve until `cancel` fires, then drain open connections.
pub async fn serve(
    listener: TcpListener,
    sink: Arc<PrometheusSink>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, build_router(sink))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
