//! Request/response audit logging.
//!
//! Buffers the request body once, resolves the request id, logs
//! `inbound_request` and `outbound_response`, and echoes the id back as
//! `X-Request-ID`.

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

use super::AppState;
use crate::types::{ProxyError, ResponseEnvelope};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Bodies above this size are rejected before reaching the handler.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

const SENSITIVE_HEADERS: [&str; 4] = ["authorization", "x-api-key", "cookie", "x-token"];
const REDACTED: &str = "[REDACTED]";

/// The id resolved for the current request, stored as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

pub async fn audit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let (mut parts, body) = request.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let request_id = resolve_request_id(&Bytes::new(), &parts.headers);
            info!(request_id = %request_id, method = %method, path = %path, error = %e, "inbound_request_rejected");
            let error = ProxyError::malformed_request(format!("Request body unreadable: {e}"));
            return with_request_id(ResponseEnvelope::failure(request_id.clone(), &error).into_response(), &request_id);
        }
    };

    let request_id = resolve_request_id(&bytes, &parts.headers);
    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        headers = ?redact_headers(&parts.headers),
        body_size = bytes.len(),
        body_preview = %body_preview(&bytes, state.body_limit),
        "inbound_request"
    );

    parts.extensions.insert(RequestId(request_id.clone()));
    let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        body_size = response_body_size(&response),
        latency_ms = started.elapsed().as_millis() as u64,
        "outbound_response"
    );
    with_request_id(response, &request_id)
}

/// Body `requestId`, else the `X-Request-ID` header, else a fresh UUID v4.
pub fn resolve_request_id(body: &Bytes, headers: &HeaderMap) -> String {
    let from_body = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("requestId").and_then(|id| id.as_str()).map(str::to_string));
    let from_header = || {
        headers
            .get(&REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    from_body
        .filter(|id| !id.trim().is_empty())
        .or_else(|| from_header().filter(|id| !id.trim().is_empty()))
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

pub fn redact_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                REDACTED.to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}

/// At most `limit` bytes of the body, lossily decoded.
pub fn body_preview(body: &Bytes, limit: usize) -> String {
    let end = body.len().min(limit);
    let mut preview = String::from_utf8_lossy(&body[..end]).into_owned();
    if body.len() > limit {
        preview.push_str("...");
    }
    preview
}

/// `Content-Length` if set, else the body's exact size when known.
pub fn response_body_size(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .or_else(|| response.body().size_hint().exact())
}

fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
