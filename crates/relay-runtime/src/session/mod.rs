//! Sessions — logical conversational contexts bound to one connection.

pub mod manager;
pub mod state;

pub use manager::SessionManager;
pub use state::SessionState;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use relay_core::ids::{ConnectionId, SessionId};

use crate::errors::RuntimeError;

/// A single session.
///
/// State and timestamps are interior-mutable so a session can be shared
/// between the manager, the dispatch layer, and its turn task.
pub struct Session {
    id: SessionId,
    connection_id: ConnectionId,
    state: Mutex<SessionState>,
    last_activity: Mutex<Instant>,
    orphaned_at: Mutex<Option<Instant>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("connection_id", &self.connection_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a new session owned by a connection. Initial state `Created`.
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            id: SessionId::new(),
            connection_id,
            state: Mutex::new(SessionState::Created),
            last_activity: Mutex::new(Instant::now()),
            orphaned_at: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Owning connection id.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Cancellation token — fired when the session closes. Pending
    /// confirmation round trips race against it.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Attempt a state transition, enforcing the state machine.
    ///
    /// Returns the previous state on success.
    pub fn transition(&self, next: SessionState) -> Result<SessionState, RuntimeError> {
        let mut state = self.state.lock();
        let current = *state;
        if current == next {
            return Ok(current);
        }
        if !current.can_transition_to(next) {
            return Err(RuntimeError::InvalidTransition {
                from: current,
                to: next,
            });
        }
        *state = next;
        debug!(session_id = %self.id, from = %current, to = %next, "session state changed");
        Ok(current)
    }

    /// Record activity now.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> std::time::Duration {
        self.last_activity.lock().elapsed()
    }

    /// Mark the session orphaned (its connection was unregistered).
    pub fn mark_orphaned(&self) {
        let mut orphaned = self.orphaned_at.lock();
        if orphaned.is_none() {
            *orphaned = Some(Instant::now());
        }
    }

    /// How long the session has been orphaned, if it is.
    pub fn orphaned_for(&self) -> Option<std::time::Duration> {
        self.orphaned_at.lock().map(|at| at.elapsed())
    }
}
