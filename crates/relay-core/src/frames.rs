//! Wire frames for the relay protocol.
//!
//! Every message on a connection is one of four kinds, internally tagged by
//! `kind`. The `id` field is the correlation key and is echoed verbatim in
//! exactly one matching response:
//!
//! - `request` — client-initiated, answered by a `response`
//! - `server_request` — server-initiated round trip, answered by a
//!   `server_response`
//!
//! The framing is transport-agnostic: any ordered duplex channel that can
//! carry these frames works.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ErrorBody, ErrorCode};

/// A single message on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    /// Client-initiated request expecting exactly one [`Frame::Response`].
    Request {
        /// Correlation id, echoed verbatim in the matching response.
        id: String,
        /// Operation name (e.g. `create_session`).
        op: String,
        /// Operation parameters.
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Reply to a client-initiated [`Frame::Request`].
    Response {
        /// Echoed correlation id.
        id: String,
        /// Result payload (present on success).
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        /// Error body (present on failure).
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorBody>,
    },
    /// Server-initiated request expecting exactly one [`Frame::ServerResponse`].
    ServerRequest {
        /// Correlation id allocated by the server's correlator.
        id: String,
        /// Operation name (e.g. `confirmation`).
        op: String,
        /// Operation parameters.
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Reply to a [`Frame::ServerRequest`].
    ServerResponse {
        /// Echoed correlation id.
        id: String,
        /// Result payload.
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
}

impl Frame {
    /// Build a client-initiated request.
    pub fn request(id: impl Into<String>, op: impl Into<String>, payload: Option<Value>) -> Self {
        Self::Request {
            id: id.into(),
            op: op.into(),
            payload,
        }
    }

    /// Build a success response.
    pub fn response(id: impl Into<String>, payload: Value) -> Self {
        Self::Response {
            id: id.into(),
            payload: Some(payload),
            error: None,
        }
    }

    /// Build an error response.
    pub fn error_response(
        id: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self::Response {
            id: id.into(),
            payload: None,
            error: Some(ErrorBody::new(code, message)),
        }
    }

    /// Build a server-initiated request.
    pub fn server_request(
        id: impl Into<String>,
        op: impl Into<String>,
        payload: Option<Value>,
    ) -> Self {
        Self::ServerRequest {
            id: id.into(),
            op: op.into(),
            payload,
        }
    }

    /// Build a server response.
    pub fn server_response(id: impl Into<String>, payload: Option<Value>) -> Self {
        Self::ServerResponse {
            id: id.into(),
            payload,
        }
    }

    /// The correlation id of this frame.
    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Request { id, .. }
            | Self::Response { id, .. }
            | Self::ServerRequest { id, .. }
            | Self::ServerResponse { id, .. } => id,
        }
    }

    /// The `kind` tag of this frame as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request { .. } => "request",
            Self::Response { .. } => "response",
            Self::ServerRequest { .. } => "server_request",
            Self::ServerResponse { .. } => "server_response",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
