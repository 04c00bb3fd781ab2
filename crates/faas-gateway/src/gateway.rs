//! Request Gateway: axum router and the per-request pipeline described in
//! §4.5 — resolve, dispatch, ensure container, wait, proxy, record.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use faas_common::{FaasError, FunctionType, Trigger};
use reqwest::Client;
use std::net::SocketAddr;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::{error, instrument};

use crate::activity::ActivityTracker;
use crate::error::ApiError;
use crate::metadata::MetadataPort;
use crate::path;
use crate::proxy;
use faas_executor::{InstanceManager, ReadinessProber};

/// Shared dependencies for every request, cheap to clone (everything
/// behind an `Arc`).
#[derive(Clone)]
pub struct GatewayState {
    pub metadata: Arc<dyn MetadataPort>,
    pub instances: Arc<InstanceManager>,
    pub readiness: Arc<ReadinessProber>,
    pub tracker: Arc<ActivityTracker>,
    pub client: Client,
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/v1/api/execute", any(execute_handler))
        .route("/v1/api/execute/", any(execute_handler))
        .route("/v1/api/execute/*rest", any(execute_handler))
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

/// Converts a panic anywhere in the request pipeline into the same
/// `{"error": "UNKNOWN_ERROR", ...}` shape as any other dispatch failure,
/// rather than the bare 500 `CatchPanicLayer` returns by default.
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %message, "request handler panicked");
    ApiError(FaasError::Unknown(message)).into_response()
}

#[instrument(skip(state, headers, body), fields(external_id))]
async fn execute_handler(
    State(state): State<GatewayState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    let response = handle(&state, method, &uri, headers, body, remote_addr).await?;
    Ok(response)
}

async fn handle(
    state: &GatewayState,
    method: Method,
    uri: &Uri,
    headers: HeaderMap,
    body: Body,
    remote_addr: SocketAddr,
) -> Result<Response, ApiError> {
    let parsed = path::parse(uri.path())?;

    let record = state.metadata.get(&parsed.external_id).await?;
    if !record.state.is_dispatchable() {
        return Err(FaasError::NotFound(format!(
            "function {} is not active",
            parsed.external_id
        ))
        .into());
    }
    if record.config.trigger != Trigger::Http {
        return Err(FaasError::Validation(format!(
            "trigger {:?} is not dispatchable",
            record.config.trigger
        ))
        .into());
    }

    match record.config.func_type {
        FunctionType::Rest => {}
        FunctionType::Single => {
            return Err(FaasError::NotImplemented(
                "SINGLE functions are not yet executable".to_string(),
            )
            .into())
        }
    }

    let container_id = state
        .instances
        .ensure_container(&parsed.external_id, &record.config)
        .await?;
    let container_base = state
        .instances
        .resolve_url_with_retry(&container_id, &record.config)
        .await?;
    state.readiness.wait_ready(&container_base).await?;

    let forward_path =
        path::forward_path_with_query(&parsed.forward_path, uri.query());

    let original_host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let response = proxy::forward(
        &state.client,
        &container_base,
        &forward_path,
        method,
        headers,
        body,
        original_host.as_deref(),
        Some(&remote_addr.ip().to_string()),
    )
    .await?;

    state.tracker.increment(&parsed.external_id);

    Ok(response)
}
