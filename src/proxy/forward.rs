//! Replay of REST calls against a healthy game backend.

use axum::{
    body::{Body, to_bytes},
    extract::Request,
    http::{HeaderMap, HeaderName, header},
    response::Response,
};
use tracing::{info, warn};

use crate::{error::ServiceError, proxy::ProxyState};

/// Largest request body relayed to a backend.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Headers describing a single hop; never copied across the proxy.
static HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::TE,
    header::TRAILER,
    header::PROXY_AUTHORIZATION,
];

/// Replay `request` against the first healthy backend and relay its answer.
///
/// Fails with [`ServiceError::NoHealthyBackend`] when the pool is empty of live servers and
/// with [`ServiceError::Upstream`] when the chosen backend breaks mid-request; a second
/// backend is never tried within the same call.
pub async fn forward_http(state: &ProxyState, request: Request) -> Result<Response, ServiceError> {
    let backend = state
        .pool()
        .probe()
        .await
        .ok_or(ServiceError::NoHealthyBackend)?;

    let (parts, body) = request.into_parts();
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{backend}{path}");
    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|err| ServiceError::InvalidInput(format!("unreadable request body: {err}")))?;

    info!(method = %parts.method, %url, "forwarding request");
    let upstream = state
        .client()
        .request(parts.method.clone(), &url)
        .headers(forwardable(&parts.headers, &[header::HOST, header::CONTENT_LENGTH]))
        .body(body)
        .send()
        .await
        .map_err(|err| upstream_failure(state, &backend, err))?;

    let status = upstream.status();
    let headers = forwardable(upstream.headers(), &[header::CONTENT_LENGTH]);
    let bytes = upstream
        .bytes()
        .await
        .map_err(|err| upstream_failure(state, &backend, err))?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

fn forwardable(headers: &HeaderMap, skip: &[HeaderName]) -> HeaderMap {
    let mut copy = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if HOP_BY_HOP.contains(name) || skip.contains(name) {
            continue;
        }
        copy.append(name.clone(), value.clone());
    }
    copy
}

fn upstream_failure(state: &ProxyState, backend: &str, err: reqwest::Error) -> ServiceError {
    warn!(backend = %backend, error = %err, "game server failed mid-request");
    state.pool().invalidate();
    ServiceError::Upstream(format!("failed to reach game server: {err}"))
}
