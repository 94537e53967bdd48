//! Axum HTTP server: router, listener, graceful shutdown.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::proxy::correlation;
use crate::proxy::dispatcher::Dispatcher;
use crate::routes;

/// Shared application state.
pub struct AppState {
    pub config: ProxyConfig,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: ProxyConfig, dispatcher: Dispatcher) -> Self {
        Self { config, dispatcher }
    }
}

/// Full application router: Kick routes plus operational endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::router())
        .route("/health", get(handle_health))
        .route("/api/stats", get(handle_get_stats))
        .layer(middleware::from_fn(correlation::attach))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Build and run the HTTP server.
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let listen_addr = state.config.server.listen_address.clone();
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "kick-proxy listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("kick-proxy shut down gracefully");
    Ok(())
}

/// GET /api/stats: dispatcher counters and whether a clearance is cached.
async fn handle_get_stats(State(state): State<Arc<AppState>>) -> Response {
    let credentials = state.dispatcher.credentials().current().await;
    axum::Json(serde_json::json!({
        "dispatch": state.dispatcher.stats().snapshot(),
        "clearance_cached": credentials.is_some(),
    }))
    .into_response()
}

/// Health check endpoint.
async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Wait for SIGINT (Ctrl+C) for graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchConfig;
    use crate::stats::ProxyStats;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let dispatcher = Dispatcher::new(DispatchConfig::default(), ProxyStats::new()).unwrap();
        router(Arc::new(AppState::new(ProxyConfig::default(), dispatcher)))
    }

    #[tokio::test]
    async fn test_health_carries_correlation_id() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let id = response
            .headers()
            .get(correlation::CORRELATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert_eq!(id.len(), 36);
    }

    #[tokio::test]
    async fn test_stats_start_empty() {
        let response = app()
            .oneshot(Request::builder().uri("/api/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["clearance_cached"], serde_json::json!(false));
        assert_eq!(body["dispatch"]["requests"], serde_json::json!(0));
        assert_eq!(body["dispatch"]["upstream_attempts"], serde_json::json!(0));
    }
}
