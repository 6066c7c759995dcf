//! Shared types for the proxy.
//!
//! Operations, upstream results, the caller-facing response envelopes
//! and the error taxonomy. Everything above the provider layer speaks in
//! these types so the pipeline stays provider-agnostic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// The closed set of logical actions a caller may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    ListLeagues,
    GetLeagueMatches,
    GetTeam,
    GetMatch,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::ListLeagues,
        Operation::GetLeagueMatches,
        Operation::GetTeam,
        Operation::GetMatch,
    ];

    /// Wire name used in `operationType`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ListLeagues => "ListLeagues",
            Operation::GetLeagueMatches => "GetLeagueMatches",
            Operation::GetTeam => "GetTeam",
            Operation::GetMatch => "GetMatch",
        }
    }

    /// Comma-separated list of valid wire names, for error messages.
    pub fn valid_names() -> String {
        Self::ALL.iter().map(|op| op.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ProxyError;

    /// Exact, case-sensitive match on the wire name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ProxyError::UnknownOperation { name: s.to_string() })
    }
}

// ---------------------------------------------------------------------------
// Upstream result
// ---------------------------------------------------------------------------

/// Outcome of one completed fetch (the final attempt, after any retries).
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResult {
    /// Parsed JSON body on success, or an `{"error": ...}` payload.
    pub data: Value,
    pub status_code: u16,
    pub latency_ms: u64,
    pub upstream_url: String,
}

impl UpstreamResult {
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

// ---------------------------------------------------------------------------
// Wire request
// ---------------------------------------------------------------------------

/// Body of `POST /proxy/execute`.
///
/// `requestId` is resolved by the audit middleware before the body is
/// decoded, so it is not part of this struct.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    pub operation_type: String,
    /// Left as raw JSON; shape is checked per operation by the validator.
    #[serde(default)]
    pub payload: Value,
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Caller-visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UnknownOperation,
    ValidationError,
    RateLimitExceeded,
    UpstreamError,
    InternalError,
}

impl ErrorCode {
    /// HTTP status class exposed to the caller.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::UnknownOperation | ErrorCode::ValidationError => 400,
            ErrorCode::RateLimitExceeded => 429,
            ErrorCode::UpstreamError => 502,
            ErrorCode::InternalError => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::UnknownOperation => "UNKNOWN_OPERATION",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::UpstreamError => "UPSTREAM_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(s)
    }
}

/// One entry of a per-field validation error map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl FieldError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self { error_type: error_type.into(), message: message.into() }
    }
}

/// Field name → error, ordered for stable output.
pub type FieldErrors = BTreeMap<String, FieldError>;

/// Every failure the pipeline can report.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProxyError {
    #[error("Unknown operationType '{name}'. Valid: {}", Operation::valid_names())]
    UnknownOperation { name: String },

    #[error("{message}")]
    Validation { message: String, fields: FieldErrors },

    #[error("Rate limit exceeded. Reset in {:.1}s", .retry_after.as_secs_f64())]
    RateLimited { provider: String, retry_after: Duration, remaining: u32 },

    #[error("Upstream API failed after retries")]
    Upstream { provider: String, status: u16, url: String, payload: Value },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn payload_invalid(operation: Operation, fields: FieldErrors) -> Self {
        ProxyError::Validation {
            message: format!("Payload validation failed for {operation}"),
            fields,
        }
    }

    pub fn malformed_request(reason: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert("body".to_string(), FieldError::new("json_invalid", reason));
        ProxyError::Validation { message: "Malformed request body".to_string(), fields }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ProxyError::UnknownOperation { .. } => ErrorCode::UnknownOperation,
            ProxyError::Validation { .. } => ErrorCode::ValidationError,
            ProxyError::RateLimited { .. } => ErrorCode::RateLimitExceeded,
            ProxyError::Upstream { .. } => ErrorCode::UpstreamError,
            ProxyError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Message safe to show the caller. Internal faults stay generic.
    pub fn public_message(&self) -> String {
        match self {
            ProxyError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Structured details for the error envelope.
    pub fn details(&self) -> Option<Value> {
        match self {
            ProxyError::UnknownOperation { .. } | ProxyError::Internal(_) => None,
            ProxyError::Validation { fields, .. } => serde_json::to_value(fields).ok(),
            ProxyError::RateLimited { provider, retry_after, remaining } => Some(json!({
                "provider": provider,
                "retryAfterSecs": retry_after_secs(*retry_after),
                "remaining": remaining,
            })),
            ProxyError::Upstream { provider, status, url, payload } => {
                let mut details = match payload {
                    Value::Object(map) => map.clone(),
                    Value::Null => serde_json::Map::new(),
                    other => {
                        let mut map = serde_json::Map::new();
                        map.insert("error".to_string(), other.clone());
                        map
                    }
                };
                details.insert("provider".to_string(), json!(provider));
                details.insert("statusCode".to_string(), json!(status));
                details.insert("upstreamUrl".to_string(), json!(url));
                Some(Value::Object(details))
            }
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProxyError::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Whole seconds for `Retry-After`, rounded up so callers never retry early.
pub fn retry_after_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 { secs + 1 } else { secs }
}

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub provider: String,
    /// Upstream latency in milliseconds.
    pub upstream_latency: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessEnvelope {
    pub request_id: String,
    success: bool,
    pub data: Value,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEnvelope {
    pub request_id: String,
    success: bool,
    pub error: ErrorDetail,
    #[serde(skip)]
    retry_after: Option<Duration>,
}

/// What the pipeline hands back for every request. Exactly one variant.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    Success(SuccessEnvelope),
    Failure(FailureEnvelope),
}

impl ResponseEnvelope {
    pub fn success(request_id: String, data: Value, metadata: ResponseMetadata) -> Self {
        ResponseEnvelope::Success(SuccessEnvelope { request_id, success: true, data, metadata })
    }

    pub fn failure(request_id: String, error: &ProxyError) -> Self {
        ResponseEnvelope::Failure(FailureEnvelope {
            request_id,
            success: false,
            error: ErrorDetail {
                code: error.code(),
                message: error.public_message(),
                details: error.details(),
            },
            retry_after: error.retry_after(),
        })
    }

    pub fn request_id(&self) -> &str {
        match self {
            ResponseEnvelope::Success(s) => &s.request_id,
            ResponseEnvelope::Failure(f) => &f.request_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseEnvelope::Success(_))
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            ResponseEnvelope::Success(_) => None,
            ResponseEnvelope::Failure(f) => Some(f.error.code),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ResponseEnvelope::Success(_) => 200,
            ResponseEnvelope::Failure(f) => f.error.code.http_status(),
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ResponseEnvelope::Success(_) => None,
            ResponseEnvelope::Failure(f) => f.retry_after,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_from_str() {
        assert_eq!("GetTeam".parse::<Operation>().unwrap(), Operation::GetTeam);
        assert_eq!("ListLeagues".parse::<Operation>().unwrap(), Operation::ListLeagues);
        assert!("getteam".parse::<Operation>().is_err());
        assert!("Bogus".parse::<Operation>().is_err());
    }

    #[test]
    fn test_unknown_operation_message_lists_valid_names() {
        let err = "Bogus".parse::<Operation>().unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownOperation);
        assert_eq!(
            err.to_string(),
            "Unknown operationType 'Bogus'. Valid: ListLeagues, GetLeagueMatches, GetTeam, GetMatch"
        );
    }

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::RateLimitExceeded).unwrap();
        assert_eq!(json, "\"RATE_LIMIT_EXCEEDED\"");
        assert_eq!(ErrorCode::UpstreamError.to_string(), "UPSTREAM_ERROR");
    }

    #[test]
    fn test_http_status_classes() {
        assert_eq!(ErrorCode::UnknownOperation.http_status(), 400);
        assert_eq!(ErrorCode::ValidationError.http_status(), 400);
        assert_eq!(ErrorCode::RateLimitExceeded.http_status(), 429);
        assert_eq!(ErrorCode::UpstreamError.http_status(), 502);
        assert_eq!(ErrorCode::InternalError.http_status(), 500);
    }

    #[test]
    fn test_internal_error_message_is_generic() {
        let err = ProxyError::Internal("registry has no decision for GetTeam".into());
        let envelope = ResponseEnvelope::failure("req-1".into(), &err);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["error"]["message"], "Internal server error");
        assert!(json["error"]["details"].is_null());
        assert!(!json.to_string().contains("registry"));
    }

    #[test]
    fn test_failure_envelope_shape() {
        let err = ProxyError::Upstream {
            provider: "openliga".into(),
            status: 504,
            url: "https://api.openligadb.de/getteam/7".into(),
            payload: json!({"error": "Request timeout"}),
        };
        let envelope = ResponseEnvelope::failure("abc".into(), &err);
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["requestId"], "abc");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "UPSTREAM_ERROR");
        assert_eq!(json["error"]["details"]["statusCode"], 504);
        assert_eq!(json["error"]["details"]["error"], "Request timeout");
        assert_eq!(envelope.http_status(), 502);
    }

    #[test]
    fn test_success_envelope_shape() {
        let envelope = ResponseEnvelope::success(
            "abc".into(),
            json!([{"id": 1}]),
            ResponseMetadata {
                provider: "openliga".into(),
                upstream_latency: 245,
                timestamp: Utc::now(),
            },
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["metadata"]["upstreamLatency"], 245);
        assert_eq!(json["metadata"]["provider"], "openliga");
        assert!(json.get("error").is_none());
        assert_eq!(envelope.http_status(), 200);
    }

    #[test]
    fn test_rate_limited_details_carry_retry_hint() {
        let err = ProxyError::RateLimited {
            provider: "openliga".into(),
            retry_after: Duration::from_millis(12_300),
            remaining: 0,
        };
        assert_eq!(err.to_string(), "Rate limit exceeded. Reset in 12.3s");
        let details = err.details().unwrap();
        assert_eq!(details["retryAfterSecs"], 13);
        assert_eq!(err.retry_after(), Some(Duration::from_millis(12_300)));
    }

    #[test]
    fn test_validation_details_are_per_field() {
        let mut fields = FieldErrors::new();
        fields.insert("teamId".into(), FieldError::new("missing", "Field required"));
        let err = ProxyError::payload_invalid(Operation::GetTeam, fields);
        assert_eq!(err.to_string(), "Payload validation failed for GetTeam");
        let details = err.details().unwrap();
        assert_eq!(details["teamId"]["type"], "missing");
        assert_eq!(details["teamId"]["message"], "Field required");
    }

    #[test]
    fn test_retry_after_secs_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_secs(5)), 5);
        assert_eq!(retry_after_secs(Duration::from_millis(5_001)), 6);
        assert_eq!(retry_after_secs(Duration::ZERO), 0);
    }

    #[test]
    fn test_proxy_request_defaults() {
        let req: ProxyRequest =
            serde_json::from_str(r#"{"operationType":"ListLeagues","requestId":"r-1"}"#).unwrap();
        assert_eq!(req.operation_type, "ListLeagues");
        assert!(req.payload.is_null());
    }
}
