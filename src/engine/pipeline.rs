//! Request pipeline.
//!
//! Drives one request through
//! `Received → OperationValidated → PayloadValidated → Executed → Normalized → Responded`
//! and converts every failure into a caller-safe `ResponseEnvelope`.
//! Built once at startup and shared by `Arc` into the HTTP handlers.

use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::providers::{build_provider, SportsProvider};
use crate::types::{Operation, ProxyError, ResponseEnvelope, ResponseMetadata};

use super::normalizer::normalize;
use super::registry::{DispatchError, OperationRegistry, RegistryError};
use super::validator::{PayloadValidator, SchemaValidator};

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Progress of a request. `Errored` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    OperationValidated,
    PayloadValidated,
    Executed,
    Normalized,
    Responded,
    Errored,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::OperationValidated => "operation_validated",
            Stage::PayloadValidated => "payload_validated",
            Stage::Executed => "executed",
            Stage::Normalized => "normalized",
            Stage::Responded => "responded",
            Stage::Errored => "errored",
        }
    }

    /// The following stage on the success path.
    pub fn next(self) -> Stage {
        match self {
            Stage::Received => Stage::OperationValidated,
            Stage::OperationValidated => Stage::PayloadValidated,
            Stage::PayloadValidated => Stage::Executed,
            Stage::Executed => Stage::Normalized,
            Stage::Normalized => Stage::Responded,
            Stage::Responded => Stage::Responded,
            Stage::Errored => Stage::Errored,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Responded | Stage::Errored)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure and the last stage reached before it.
#[derive(Debug)]
struct Failure {
    stage: Stage,
    error: ProxyError,
}

impl Failure {
    fn at(stage: Stage) -> impl FnOnce(ProxyError) -> Failure {
        move |error| Failure { stage, error }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    registry: OperationRegistry,
    validator: Box<dyn PayloadValidator>,
}

impl Pipeline {
    /// Pipeline over `provider` with the default decisions and schemas.
    pub fn new(provider: Arc<dyn SportsProvider>) -> Result<Self, RegistryError> {
        let registry = OperationRegistry::with_default_decisions(provider)?;
        Ok(Self::with_parts(registry, Box::new(SchemaValidator)))
    }

    pub fn with_parts(registry: OperationRegistry, validator: Box<dyn PayloadValidator>) -> Self {
        Self { registry, validator }
    }

    /// Build the configured provider and wire a pipeline around it.
    pub fn from_config(cfg: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self, RegistryError> {
        Self::new(build_provider(cfg, clock))
    }

    pub fn provider_name(&self) -> &'static str {
        self.registry.provider_name()
    }

    /// Run one request. Always returns an envelope carrying `request_id`.
    pub async fn execute(&self, operation_name: &str, payload: &Value, request_id: String) -> ResponseEnvelope {
        let span = info_span!("proxy_request", request_id = %request_id, operation = %operation_name);

        async move {
            info!(request_id = %request_id, operation = operation_name, "proxy_request_received");

            match self.run(operation_name, payload, &request_id).await {
                Ok((data, metadata)) => {
                    info!(
                        request_id = %request_id,
                        operation = operation_name,
                        stage = %Stage::Responded,
                        provider = %metadata.provider,
                        upstream_latency_ms = metadata.upstream_latency,
                        "proxy_request_success"
                    );
                    ResponseEnvelope::success(request_id, data, metadata)
                }
                Err(Failure { stage, error }) => {
                    let code = error.code();
                    if code.http_status() >= 500 {
                        error!(
                            request_id = %request_id,
                            operation = operation_name,
                            stage = %stage,
                            code = %code,
                            error = %error,
                            "proxy_request_error"
                        );
                    } else {
                        warn!(
                            request_id = %request_id,
                            operation = operation_name,
                            stage = %stage,
                            code = %code,
                            error = %error,
                            "proxy_request_error"
                        );
                    }
                    ResponseEnvelope::failure(request_id, &error)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        operation_name: &str,
        payload: &Value,
        request_id: &str,
    ) -> Result<(Value, ResponseMetadata), Failure> {
        let stage = Stage::Received;
        let operation: Operation = operation_name.parse().map_err(Failure::at(stage))?;

        let stage = stage.next();
        let validated = match self.validator.validate(operation, payload) {
            Ok(validated) => validated,
            Err(fields) => {
                let names: Vec<&String> = fields.keys().collect();
                warn!(
                    request_id,
                    operation = %operation,
                    fields = ?names,
                    "validation_failed"
                );
                return Err(Failure { stage, error: ProxyError::payload_invalid(operation, fields) });
            }
        };
        info!(request_id, operation = %operation, "validation_passed");

        let stage = stage.next();
        let decision = self
            .registry
            .lookup(operation.as_str())
            .map_err(|e| ProxyError::Internal(e.to_string()))
            .map_err(Failure::at(stage))?;
        let provider = self.provider_name();
        info!(request_id, operation = %operation, provider, capability = ?decision.capability, "upstream_call");

        let outcome = AssertUnwindSafe(self.registry.execute(decision, &validated)).catch_unwind().await;
        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(DispatchError::RateLimited(denied))) => {
                return Err(Failure {
                    stage,
                    error: ProxyError::RateLimited {
                        provider: provider.to_string(),
                        retry_after: denied.reset_in,
                        remaining: denied.remaining,
                    },
                });
            }
            Ok(Err(DispatchError::Registry(e))) => {
                return Err(Failure { stage, error: ProxyError::Internal(e.to_string()) });
            }
            Err(panic) => {
                return Err(Failure {
                    stage,
                    error: ProxyError::Internal(format!("provider panicked: {}", panic_message(&*panic))),
                });
            }
        };

        if !result.is_success() {
            warn!(
                request_id,
                operation = %operation,
                provider,
                status_code = result.status_code,
                upstream_url = %result.upstream_url,
                latency_ms = result.latency_ms,
                "upstream_failed"
            );
            return Err(Failure {
                stage,
                error: ProxyError::Upstream {
                    provider: provider.to_string(),
                    status: result.status_code,
                    url: result.upstream_url,
                    payload: result.data,
                },
            });
        }

        let data = normalize(operation, &result.data);
        let metadata = ResponseMetadata {
            provider: provider.to_string(),
            upstream_latency: result.latency_ms,
            timestamp: Utc::now(),
        };
        Ok((data, metadata))
    }

    /// Release provider resources. Idempotent.
    pub fn shutdown(&self) {
        info!(provider = self.provider_name(), "Shutting down provider");
        self.registry.provider().shutdown();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
