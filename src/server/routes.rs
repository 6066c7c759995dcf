//! HTTP route handlers.
//!
//! Handlers stay thin: decode the wire request, hand it to the pipeline,
//! and render the envelope with its HTTP status.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;

use super::audit::RequestId;
use super::AppState;
use crate::types::{retry_after_secs, ProxyError, ProxyRequest, ResponseEnvelope};

pub const SERVICE_NAME: &str = "openliga-proxy";

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", service: SERVICE_NAME, version: env!("CARGO_PKG_VERSION") })
}

/// POST /proxy/execute
pub async fn execute(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    body: Bytes,
) -> ResponseEnvelope {
    let request_id = match request_id {
        Some(Extension(RequestId(id))) => id,
        None => uuid::Uuid::new_v4().to_string(),
    };

    let request: ProxyRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return ResponseEnvelope::failure(request_id, &ProxyError::malformed_request(e.to_string())),
    };

    state.pipeline.execute(&request.operation_type, &request.payload, request_id).await
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let retry_after = self.retry_after();

        let mut response = (status, Json(self)).into_response();
        if let Some(wait) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs(wait)));
        }
        response
    }
}
