//! Op registry and async dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::warn;

use relay_core::errors::ErrorCode;
use relay_core::frames::Frame;

use super::context::OpContext;
use super::error::OpError;

/// Trait implemented by every op handler.
#[async_trait]
pub trait OpHandler: Send + Sync {
    /// Execute the handler with the given payload and context.
    async fn handle(&self, payload: Option<Value>, ctx: &OpContext) -> Result<Value, OpError>;
}

/// Registry mapping op names to handlers.
pub struct OpRegistry {
    handlers: HashMap<String, Arc<dyn OpHandler>>,
}

impl OpRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for an op name.
    pub fn register(&mut self, op: &str, handler: impl OpHandler + 'static) {
        let _ = self.handlers.insert(op.to_owned(), Arc::new(handler));
    }

    /// Maximum time a single op handler may run. Generous: a `use_engine`
    /// turn can span several confirmation round trips.
    const HANDLER_TIMEOUT: Duration = Duration::from_secs(600);

    /// Dispatch a request to the appropriate handler, producing the response
    /// frame for the echoed correlation id.
    pub async fn dispatch(
        &self,
        id: &str,
        op: &str,
        payload: Option<Value>,
        ctx: &OpContext,
    ) -> Frame {
        counter!("op_requests_total", "op" => op.to_owned()).increment(1);

        let Some(handler) = self.handlers.get(op) else {
            warn!(op, "unknown op");
            counter!("op_errors_total", "op" => op.to_owned(), "error_type" => "op_not_found")
                .increment(1);
            return Frame::error_response(id, ErrorCode::OpNotFound, format!("Op '{op}' not found"));
        };

        let start = std::time::Instant::now();
        let result = tokio::time::timeout(Self::HANDLER_TIMEOUT, handler.handle(payload, ctx)).await;

        let response = match result {
            Ok(Ok(value)) => Frame::response(id, value),
            Ok(Err(err)) => {
                counter!("op_errors_total", "op" => op.to_owned(), "error_type" => err.code.to_string())
                    .increment(1);
                Frame::Response {
                    id: id.to_owned(),
                    payload: None,
                    error: Some(err.to_body()),
                }
            }
            Err(_elapsed) => {
                counter!("op_errors_total", "op" => op.to_owned(), "error_type" => "timeout")
                    .increment(1);
                tracing::error!(op, "op handler timed out after {:?}", Self::HANDLER_TIMEOUT);
                Frame::error_response(
                    id,
                    ErrorCode::InternalError,
                    format!("Handler for '{op}' timed out"),
                )
            }
        };

        let duration = start.elapsed();
        histogram!("op_request_duration_seconds", "op" => op.to_owned())
            .record(duration.as_secs_f64());

        response
    }

    /// List all registered op names (sorted).
    pub fn ops(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check whether an op is registered.
    pub fn has_op(&self, op: &str) -> bool {
        self.handlers.contains_key(op)
    }
}

impl Default for OpRegistry {
    fn default() -> Self {
        Self::new()
    }
}
