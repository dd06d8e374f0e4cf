//! Runtime error types.

use relay_core::errors::ErrorCode;

use crate::provider::ProviderError;
use crate::session::SessionState;

/// Errors that can occur during session and turn execution.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Model provider error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Session not found.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session already has a turn in flight.
    #[error("Session busy: {0}")]
    SessionBusy(String),

    /// No engine is linked to the session.
    #[error("No engine linked to session: {0}")]
    EngineNotLinked(String),

    /// Engine linking failed.
    #[error("Engine link failed: {0}")]
    EngineLink(String),

    /// The model/tool cycle exceeded the configured iteration cap.
    #[error("Tool loop exceeded {0} iterations")]
    ToolLoopExceeded(u32),

    /// The turn was cancelled (session closed mid-flight).
    #[error("Operation cancelled")]
    Cancelled,

    /// The owning connection was lost mid-turn.
    #[error("Connection lost")]
    ConnectionLost,

    /// A session state transition that the state machine forbids.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: SessionState,
        /// Requested state.
        to: SessionState,
    },

    /// Internal / unexpected error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Error category string for logging and event emission.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Provider(_) => "provider",
            Self::SessionNotFound(_) => "session_not_found",
            Self::SessionBusy(_) => "session_busy",
            Self::EngineNotLinked(_) => "engine_not_linked",
            Self::EngineLink(_) => "engine_link",
            Self::ToolLoopExceeded(_) => "tool_loop_exceeded",
            Self::Cancelled => "cancelled",
            Self::ConnectionLost => "connection_lost",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Internal(_) => "internal",
        }
    }

    /// The wire error code this error maps to.
    pub fn wire_code(&self) -> ErrorCode {
        match self {
            Self::SessionNotFound(_) => ErrorCode::SessionNotFound,
            Self::SessionBusy(_) | Self::InvalidTransition { .. } => ErrorCode::SessionBusy,
            Self::EngineNotLinked(_) => ErrorCode::EngineNotLinked,
            Self::EngineLink(_) => ErrorCode::EngineLinkError,
            Self::ToolLoopExceeded(_) => ErrorCode::ToolLoopExceeded,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::ConnectionLost => ErrorCode::ConnectionLost,
            Self::Provider(_) | Self::Internal(_) => ErrorCode::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail() {
        let err = RuntimeError::SessionNotFound("sess-1".into());
        assert!(err.to_string().contains("sess-1"));

        let err = RuntimeError::ToolLoopExceeded(16);
        assert!(err.to_string().contains("16"));
    }

    #[test]
    fn category_strings() {
        assert_eq!(RuntimeError::Cancelled.category(), "cancelled");
        assert_eq!(RuntimeError::ConnectionLost.category(), "connection_lost");
        assert_eq!(
            RuntimeError::EngineNotLinked("s".into()).category(),
            "engine_not_linked"
        );
    }

    #[test]
    fn wire_code_mapping() {
        assert_eq!(
            RuntimeError::SessionNotFound("s".into()).wire_code(),
            ErrorCode::SessionNotFound
        );
        assert_eq!(
            RuntimeError::EngineLink("bad type".into()).wire_code(),
            ErrorCode::EngineLinkError
        );
        assert_eq!(
            RuntimeError::ToolLoopExceeded(8).wire_code(),
            ErrorCode::ToolLoopExceeded
        );
        assert_eq!(RuntimeError::Cancelled.wire_code(), ErrorCode::Cancelled);
    }

    #[test]
    fn invalid_transition_display() {
        let err = RuntimeError::InvalidTransition {
            from: SessionState::Created,
            to: SessionState::Running,
        };
        let display = err.to_string();
        assert!(display.contains("created"));
        assert!(display.contains("running"));
    }
}
