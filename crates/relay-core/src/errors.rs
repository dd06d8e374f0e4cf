//! Wire error codes.
//!
//! Every error surfaced to a client carries a machine-readable code,
//! eliminating string-based error detection on the other side.

use serde::{Deserialize, Serialize};
use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Error codes
// ─────────────────────────────────────────────────────────────────────────────

/// Centralized wire error codes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // Protocol
    /// Malformed or unmatched message. The connection stays open.
    #[serde(rename = "PROTOCOL_ERROR")]
    ProtocolError,
    /// Invalid parameters.
    #[serde(rename = "INVALID_PARAMS")]
    InvalidParams,
    /// Operation not found.
    #[serde(rename = "OP_NOT_FOUND")]
    OpNotFound,

    // Correlation
    /// No response arrived before the request deadline.
    #[serde(rename = "CORRELATION_TIMEOUT")]
    CorrelationTimeout,
    /// The connection closed while the request was pending.
    #[serde(rename = "CONNECTION_LOST")]
    ConnectionLost,
    /// A request with this correlation id is already pending.
    #[serde(rename = "DUPLICATE_CORRELATION_ID")]
    DuplicateCorrelationId,

    // Session
    /// Session not found.
    #[serde(rename = "SESSION_NOT_FOUND")]
    SessionNotFound,
    /// Session already has a turn in flight.
    #[serde(rename = "SESSION_BUSY")]
    SessionBusy,

    // Engine
    /// No engine is linked to the session.
    #[serde(rename = "ENGINE_NOT_LINKED")]
    EngineNotLinked,
    /// Engine linking failed.
    #[serde(rename = "ENGINE_LINK_ERROR")]
    EngineLinkError,

    // Turn
    /// The model/tool cycle exceeded the configured iteration cap.
    #[serde(rename = "TOOL_LOOP_EXCEEDED")]
    ToolLoopExceeded,
    /// The operation was cancelled.
    #[serde(rename = "CANCELLED")]
    Cancelled,

    /// Internal server error.
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_string(self).unwrap_or_else(|_| "UNKNOWN".to_owned());
        // Strip surrounding quotes
        write!(f, "{}", s.trim_matches('"'))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error body
// ─────────────────────────────────────────────────────────────────────────────

/// Structured error body inside a response frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ErrorBody {
    /// Create a new error body.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
