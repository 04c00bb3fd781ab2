//! Reverse proxy: forwards a request onto a resolved container URL and
//! streams the upstream response back unchanged (§4.5, §6).

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use faas_common::{FaasError, Result};
use reqwest::Client;
use tracing::instrument;

/// Proxies one request to `container_base + forward_path`, preserving
/// method, headers, and body, and injecting `Host`, `X-Forwarded-Host`, and
/// `X-Real-IP` on the upstream hop. Both the request and response bodies are
/// streamed rather than buffered, so no core-level limit is imposed on their
/// size (§5: "no core-level timeout is imposed on upstream response bodies").
#[instrument(skip(client, headers, body), fields(forward_path))]
pub async fn forward(
    client: &Client,
    container_base: &str,
    forward_path: &str,
    method: Method,
    headers: HeaderMap,
    body: Body,
    original_host: Option<&str>,
    remote_addr: Option<&str>,
) -> Result<Response> {
    let target = format!("{container_base}{forward_path}");

    let upstream_body = reqwest::Body::wrap_stream(body.into_data_stream());
    let mut request = client.request(method, &target).body(upstream_body);

    for (name, value) in headers.iter() {
        if name == axum::http::header::HOST {
            continue;
        }
        request = request.header(name, value);
    }

    if let Ok(target_url) = reqwest::Url::parse(&target) {
        if let Some(host) = target_url.host_str() {
            let host_header = match target_url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
            request = request.header(reqwest::header::HOST, host_header);
        }
    }
    if let Some(host) = original_host {
        request = request.header(
            HeaderName::from_static("x-forwarded-host"),
            host.to_string(),
        );
    }
    if let Some(addr) = remote_addr {
        request = request.header(HeaderName::from_static("x-real-ip"), addr.to_string());
    }

    let upstream = request
        .send()
        .await
        .map_err(|e| FaasError::Docker(format!("upstream request to {target} failed: {e}")))?;

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let upstream_headers = upstream.headers().clone();
    let response_body = Body::from_stream(upstream.bytes_stream());

    let mut response = (status, response_body).into_response();
    for (name, value) in upstream_headers.iter() {
        response.headers_mut().insert(name, value.clone());
    }
    Ok(response)
}
