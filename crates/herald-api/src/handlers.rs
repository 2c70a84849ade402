//! Route handlers: the fixed health endpoint and the dispatch fallback.

use std::collections::BTreeMap;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use herald_action::{DispatchOutcome, RouteRequest, RouteResponse};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::ApiState;

/// Request bodies above this size are refused before dispatch.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub mount: String,
    /// Registered actions per kind.
    pub actions: BTreeMap<String, usize>,
}

/// GET /health - liveness plus a summary of the loaded registry.
pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let registry = state.dispatcher.registry().snapshot();
    let actions = registry
        .counts()
        .into_iter()
        .map(|(kind, count)| (kind.to_string(), count))
        .collect();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        mount: state.dispatcher.mount().to_string(),
        actions,
    })
}

// =============================================================================
// Action routes
// =============================================================================

/// Fallback for every path not served above: dispatch to a route action.
pub async fn dispatch(State(state): State<ApiState>, request: Request) -> Result<Response, ApiError> {
    let request = into_route_request(request).await?;
    let method = request.method.clone();
    let path = request.path.clone();

    let (outcome, response) = state.dispatcher.dispatch_route(request).await;
    match &outcome {
        DispatchOutcome::Failed(error) => {
            tracing::warn!(%method, %path, %error, "Route action failed")
        }
        DispatchOutcome::Denied(reason) => {
            tracing::debug!(%method, %path, %reason, "Route action denied")
        }
        _ => {}
    }
    Ok(into_response(response))
}

async fn into_route_request(request: Request) -> Result<RouteRequest, ApiError> {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| ApiError::PayloadTooLarge {
            limit: MAX_BODY_BYTES,
        })?;

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    Ok(RouteRequest {
        method: parts.method.as_str().to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers,
        body: body.to_vec(),
    })
}

/// Convert a handler's response. Headers that are not valid HTTP are
/// dropped with a warning.
fn into_response(response: RouteResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut out = (status, Body::from(response.body)).into_response();

    for (name, value) in response.headers {
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(name), Ok(value)) => {
                out.headers_mut().insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid response header"),
        }
    }
    out
}
