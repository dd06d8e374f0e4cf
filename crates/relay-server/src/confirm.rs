//! Correlator-backed confirmation gateway.
//!
//! A confirmation round trip is a first-class `server_request` through the
//! same correlator used for everything else on the connection, so timeout
//! and cancellation behavior are shared, not reimplemented.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use relay_core::ops;
use relay_runtime::confirm::{ConfirmationGateway, ConfirmationOutcome, ConfirmationRequest};

use crate::connection::Connection;
use crate::correlator::CorrelationError;

/// Confirmation gateway for one connection.
pub struct ConnectionGateway {
    connection: Arc<Connection>,
}

impl ConnectionGateway {
    /// Create a gateway issuing round trips on `connection`.
    pub fn new(connection: Arc<Connection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl ConfirmationGateway for ConnectionGateway {
    async fn confirm(
        &self,
        request: ConfirmationRequest,
        cancel: &CancellationToken,
    ) -> ConfirmationOutcome {
        let payload = json!({
            "session_id": request.session_id,
            "prompt": request.prompt,
            "routing_context": request.routing,
            "timeout_seconds": request.timeout.as_secs(),
        });

        let result = self
            .connection
            .correlator()
            .send_request_cancellable(ops::CONFIRMATION, payload, request.timeout, cancel)
            .await;

        let outcome = match result {
            // Anything other than an explicit `confirmed: true` is a denial.
            Ok(value) => {
                if value.get("confirmed").and_then(Value::as_bool).unwrap_or(false) {
                    ConfirmationOutcome::Confirmed
                } else {
                    ConfirmationOutcome::Denied
                }
            }
            Err(CorrelationError::Timeout) => ConfirmationOutcome::TimedOut,
            Err(CorrelationError::Cancelled) => ConfirmationOutcome::Cancelled,
            Err(
                CorrelationError::ConnectionLost
                | CorrelationError::QueueClosed
                | CorrelationError::DuplicateId(_),
            ) => ConfirmationOutcome::ConnectionLost,
        };
        debug!(
            session_id = %request.session_id,
            outcome = outcome.as_str(),
            "confirmation round trip resolved"
        );
        outcome
    }
}
