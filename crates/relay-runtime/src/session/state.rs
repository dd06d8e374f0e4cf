//! Session state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a session.
///
/// `Created → EngineLinking → Idle ⇄ Running ⇄ AwaitingConfirmation → Idle`,
/// any state `→ Terminating → Closed`. Only `Idle`, `Running`, and
/// `AwaitingConfirmation` may host an active tool-execution loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Freshly created, no engine yet.
    Created,
    /// An engine link is being established.
    EngineLinking,
    /// Engine linked, no turn in flight.
    Idle,
    /// A turn is in flight.
    Running,
    /// A turn is suspended on a confirmation round trip.
    AwaitingConfirmation,
    /// The owning connection is gone; the session is winding down.
    Terminating,
    /// Fully closed. Terminal.
    Closed,
}

impl SessionState {
    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// `Terminating` and `Closed` are reachable from any non-terminal state
    /// (close is valid from any state).
    pub fn can_transition_to(self, next: Self) -> bool {
        if self == Self::Closed {
            return false;
        }
        if matches!(next, Self::Terminating | Self::Closed) {
            return true;
        }
        matches!(
            (self, next),
            (Self::Created | Self::Idle, Self::EngineLinking)
                | (Self::EngineLinking, Self::Created | Self::Idle)
                | (Self::Idle | Self::AwaitingConfirmation, Self::Running)
                | (Self::Running, Self::AwaitingConfirmation | Self::Idle)
                | (Self::AwaitingConfirmation, Self::Idle)
        )
    }

    /// Whether this state is terminal.
    pub fn is_terminal(self) -> bool {
        self == Self::Closed
    }

    /// Whether a tool-execution loop may be active in this state.
    pub fn allows_turn(self) -> bool {
        matches!(self, Self::Idle | Self::Running | Self::AwaitingConfirmation)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::EngineLinking => "engine_linking",
            Self::Idle => "idle",
            Self::Running => "running",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::Terminating => "terminating",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}
