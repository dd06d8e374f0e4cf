//! Confirmation round trips.
//!
//! When the model requests a tool that carries the confirmation policy bit,
//! the loop asks a human through the [`ConfirmationGateway`] and suspends
//! that one tool call until the answer arrives. Absence of an answer is a
//! denial, never an approval.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use relay_core::ids::SessionId;
use relay_core::tools::RoutingContext;

/// One confirmation round trip. Ephemeral: exists only for the duration of
/// the round trip.
#[derive(Clone, Debug)]
pub struct ConfirmationRequest {
    /// Session asking for confirmation.
    pub session_id: SessionId,
    /// Human-readable description of the action.
    pub prompt: String,
    /// Where to address the prompt on the client side.
    pub routing: RoutingContext,
    /// Deadline for the answer.
    pub timeout: Duration,
}

/// How a confirmation round trip resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// The human approved the action.
    Confirmed,
    /// The human declined the action.
    Denied,
    /// No answer arrived before the deadline. Treated as a denial.
    TimedOut,
    /// The session was closed while the round trip was pending.
    Cancelled,
    /// The owning connection was lost while the round trip was pending.
    ConnectionLost,
}

impl ConfirmationOutcome {
    /// Whether the action may proceed. Only an explicit approval counts.
    pub fn is_approved(self) -> bool {
        matches!(self, Self::Confirmed)
    }

    /// Stable label for logging and events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Denied => "denied",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::ConnectionLost => "connection_lost",
        }
    }
}

/// The seam between the loop and the transport.
///
/// The server implements this over its correlator (a `server_request` frame
/// answered by a `server_response`); tests implement it with scripted
/// outcomes.
#[async_trait]
pub trait ConfirmationGateway: Send + Sync {
    /// Ask a human to confirm an action, racing the session's cancellation
    /// token against the answer and the deadline.
    async fn confirm(
        &self,
        request: ConfirmationRequest,
        cancel: &CancellationToken,
    ) -> ConfirmationOutcome;
}
