//! Typed errors for op handlers.

use std::fmt;

use relay_core::errors::{ErrorBody, ErrorCode};
use relay_runtime::RuntimeError;

/// An op handler failure, carrying the wire error code to respond with.
#[derive(Clone, Debug)]
pub struct OpError {
    /// Machine-readable wire code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl OpError {
    /// Create a new op error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Invalid parameters.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    /// Internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The wire error body for this error.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody::new(self.code.clone(), self.message.clone())
    }
}

impl fmt::Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for OpError {}

impl From<RuntimeError> for OpError {
    fn from(e: RuntimeError) -> Self {
        Self {
            code: e.wire_code(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let err = OpError::invalid_params("missing field 'prompt'");
        let display = err.to_string();
        assert!(display.contains("INVALID_PARAMS"));
        assert!(display.contains("prompt"));
    }

    #[test]
    fn from_runtime_error_maps_code() {
        let err: OpError = RuntimeError::EngineNotLinked("s1".into()).into();
        assert_eq!(err.code, ErrorCode::EngineNotLinked);
        assert!(err.message.contains("s1"));
    }

    #[test]
    fn to_body() {
        let err = OpError::internal("boom");
        let body = err.to_body();
        assert_eq!(body.code, ErrorCode::InternalError);
        assert_eq!(body.message, "boom");
    }
}
