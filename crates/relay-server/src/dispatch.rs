//! Inbound frame routing.
//!
//! One function, one rule set:
//!
//! - `request` frames dispatch to the op registry on a **spawned task**, so
//!   a slow handler (a turn with confirmation round trips) never blocks the
//!   read loop or other sessions' traffic;
//! - `response` / `server_response` frames resolve the connection's
//!   correlator inline — cheap, lock-and-send;
//! - anything malformed or unmatched is a protocol anomaly: logged, counted,
//!   the connection stays open.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use relay_core::errors::ErrorCode;
use relay_core::frames::Frame;

use crate::rpc::context::OpContext;
use crate::rpc::registry::OpRegistry;

/// Handle one inbound text message on a connection.
pub fn handle_text(text: &str, registry: &Arc<OpRegistry>, ctx: &OpContext) {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(connection_id = %ctx.connection.id(), error = %e, "malformed frame dropped");
            metrics::counter!("protocol_anomalies_total").increment(1);
            let _ = ctx.connection.send(Frame::error_response(
                "unknown",
                ErrorCode::ProtocolError,
                format!("Invalid frame: {e}"),
            ));
            return;
        }
    };
    handle_frame(frame, registry, ctx);
}

/// Handle one inbound frame on a connection.
pub fn handle_frame(frame: Frame, registry: &Arc<OpRegistry>, ctx: &OpContext) {
    match frame {
        Frame::Request { id, op, payload } => {
            debug!(connection_id = %ctx.connection.id(), id, op, "dispatching request");
            let registry = registry.clone();
            let ctx = ctx.clone();
            let _ = tokio::spawn(async move {
                let response = registry.dispatch(&id, &op, payload, &ctx).await;
                if !ctx.connection.send(response) {
                    warn!(
                        connection_id = %ctx.connection.id(),
                        id,
                        "failed to enqueue response (queue full or closed)"
                    );
                }
            });
        }
        Frame::ServerResponse { id, payload } => {
            ctx.connection
                .correlator()
                .resolve_response(&id, payload.unwrap_or(Value::Null));
        }
        Frame::Response { id, payload, error } => {
            // Symmetric peers may answer with plain responses; an error body
            // still resolves the pending entry (the caller interprets it).
            if let Some(body) = &error {
                debug!(connection_id = %ctx.connection.id(), id, code = %body.code, "response carried an error body");
            }
            let payload = payload
                .or_else(|| error.map(|body| serde_json::to_value(body).unwrap_or(Value::Null)))
                .unwrap_or(Value::Null);
            ctx.connection.correlator().resolve_response(&id, payload);
        }
        Frame::ServerRequest { id, op, .. } => {
            // This end originates server requests; receiving one is an
            // anomaly. Drop it, keep the connection.
            warn!(
                connection_id = %ctx.connection.id(),
                id,
                op,
                "unexpected server_request from peer dropped"
            );
            metrics::counter!("protocol_anomalies_total").increment(1);
        }
    }
}
