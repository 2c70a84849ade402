//! Router setup and server startup.

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use herald_core::config::ApiConfig;
use herald_core::HeraldError;
use tower_http::trace::TraceLayer;

use crate::handlers::{self, MAX_BODY_BYTES};
use crate::state::ApiState;

/// Build the router: `/health` plus a fallback that dispatches to route
/// actions under the mount prefix.
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .fallback(handlers::dispatch)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn start_server(
    config: &ApiConfig,
    state: ApiState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), HeraldError> {
    let addr = format!("{}:{}", config.host, config.port);
    let router = create_router(state);

    tracing::info!(%addr, mount = %config.mount, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HeraldError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| HeraldError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
