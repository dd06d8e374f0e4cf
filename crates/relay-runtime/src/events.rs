//! Broadcast-based event emitter for session and turn lifecycle.
//!
//! Embedders subscribe to observe progress (status messages, dashboards);
//! the relay itself never depends on anyone listening.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use relay_core::ids::{ConnectionId, EngineId, SessionId};

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// Lifecycle events emitted by the runtime.
#[derive(Clone, Debug)]
pub enum RelayEvent {
    /// A session was created.
    SessionCreated {
        /// The new session.
        session_id: SessionId,
        /// Owning connection.
        connection_id: ConnectionId,
    },
    /// A session was closed.
    SessionClosed {
        /// The closed session.
        session_id: SessionId,
    },
    /// An engine was linked to a session.
    EngineLinked {
        /// The session.
        session_id: SessionId,
        /// The new engine.
        engine_id: EngineId,
        /// Engine type name.
        engine_type: String,
    },
    /// A turn started.
    TurnStarted {
        /// The session.
        session_id: SessionId,
    },
    /// A turn completed normally.
    TurnCompleted {
        /// The session.
        session_id: SessionId,
        /// Model/tool iterations used.
        iterations: u32,
    },
    /// A turn failed.
    TurnFailed {
        /// The session.
        session_id: SessionId,
        /// Error description.
        error: String,
    },
    /// A tool call began executing.
    ToolStarted {
        /// The session.
        session_id: SessionId,
        /// Tool name.
        tool_name: String,
    },
    /// A tool call finished.
    ToolCompleted {
        /// The session.
        session_id: SessionId,
        /// Tool name.
        tool_name: String,
        /// Whether the result is an error.
        is_error: bool,
    },
    /// A confirmation round trip was issued.
    ConfirmationRequested {
        /// The session.
        session_id: SessionId,
        /// Prompt shown to the human.
        prompt: String,
    },
    /// A confirmation round trip resolved.
    ConfirmationResolved {
        /// The session.
        session_id: SessionId,
        /// Outcome label (`confirmed`, `denied`, `timed_out`, ...).
        outcome: &'static str,
    },
}

impl RelayEvent {
    /// Stable event type string.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session.created",
            Self::SessionClosed { .. } => "session.closed",
            Self::EngineLinked { .. } => "engine.linked",
            Self::TurnStarted { .. } => "turn.started",
            Self::TurnCompleted { .. } => "turn.completed",
            Self::TurnFailed { .. } => "turn.failed",
            Self::ToolStarted { .. } => "tool.started",
            Self::ToolCompleted { .. } => "tool.completed",
            Self::ConfirmationRequested { .. } => "confirmation.requested",
            Self::ConfirmationResolved { .. } => "confirmation.resolved",
        }
    }

    /// The session this event belongs to.
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::SessionCreated { session_id, .. }
            | Self::SessionClosed { session_id }
            | Self::EngineLinked { session_id, .. }
            | Self::TurnStarted { session_id }
            | Self::TurnCompleted { session_id, .. }
            | Self::TurnFailed { session_id, .. }
            | Self::ToolStarted { session_id, .. }
            | Self::ToolCompleted { session_id, .. }
            | Self::ConfirmationRequested { session_id, .. }
            | Self::ConfirmationResolved { session_id, .. } => session_id,
        }
    }
}

/// Broadcast-based event emitter.
///
/// Non-blocking: `emit` never awaits. Slow receivers lag and drop rather
/// than blocking the sender.
pub struct EventEmitter {
    tx: broadcast::Sender<RelayEvent>,
    emit_count: AtomicU64,
}

impl EventEmitter {
    /// Create a new emitter with the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new emitter with a custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            emit_count: AtomicU64::new(0),
        }
    }

    /// Emit an event to all subscribers. Returns the number of receivers
    /// that got it (0 when nobody is listening).
    pub fn emit(&self, event: RelayEvent) -> usize {
        let _ = self.emit_count.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total events emitted so far.
    pub fn emit_count(&self) -> u64 {
        self.emit_count.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
