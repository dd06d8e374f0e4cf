//! Single tool-call execution: confirmation gate → cancellation check →
//! execute → result.

use std::sync::Arc;

use tracing::{debug, warn};

use relay_core::tools::{error_result, text_result, RoutingContext, ToolCall, ToolResult};

use crate::confirm::{ConfirmationGateway, ConfirmationOutcome, ConfirmationRequest};
use crate::engine::Engine;
use crate::errors::RuntimeError;
use crate::events::{EventEmitter, RelayEvent};
use crate::session::{Session, SessionState};
use crate::tools::ToolContext;

use super::TurnOptions;

/// Execute one tool call for a running turn.
///
/// Per-call failures (unknown tool, bad arguments, execution errors, denied
/// or timed-out confirmations) come back as tool results so the model can
/// react. Only `Cancelled` and `ConnectionLost` abort the turn.
pub(crate) async fn execute_tool_call(
    session: &Arc<Session>,
    engine: &Arc<Engine>,
    call: &ToolCall,
    routing: &RoutingContext,
    gateway: &dyn ConfirmationGateway,
    options: &TurnOptions,
    emitter: &EventEmitter,
) -> Result<ToolResult, RuntimeError> {
    let Some(tool) = engine.tools().get(&call.name) else {
        warn!(tool_name = %call.name, "tool not found");
        return Ok(error_result(format!("Tool not found: {}", call.name)));
    };

    if tool.requires_confirmation() {
        let prompt = tool.confirmation_prompt(&call.arguments);
        let _ = session.transition(SessionState::AwaitingConfirmation)?;
        let _ = emitter.emit(RelayEvent::ConfirmationRequested {
            session_id: session.id().clone(),
            prompt: prompt.clone(),
        });

        let request = ConfirmationRequest {
            session_id: session.id().clone(),
            prompt,
            routing: routing.clone(),
            timeout: options.confirmation_timeout,
        };
        let outcome = gateway.confirm(request, session.cancellation()).await;
        let _ = emitter.emit(RelayEvent::ConfirmationResolved {
            session_id: session.id().clone(),
            outcome: outcome.as_str(),
        });

        match outcome {
            ConfirmationOutcome::Confirmed => {
                let _ = session.transition(SessionState::Running)?;
            }
            ConfirmationOutcome::Denied => {
                let _ = session.transition(SessionState::Running)?;
                debug!(tool_name = %call.name, "tool call declined by user");
                return Ok(text_result(format!(
                    "Tool call `{}` was not approved: the user declined.",
                    call.name
                )));
            }
            ConfirmationOutcome::TimedOut => {
                let _ = session.transition(SessionState::Running)?;
                debug!(tool_name = %call.name, "confirmation timed out, treating as denial");
                return Ok(text_result(format!(
                    "Tool call `{}` was not approved: no answer arrived before the deadline.",
                    call.name
                )));
            }
            ConfirmationOutcome::Cancelled => return Err(RuntimeError::Cancelled),
            ConfirmationOutcome::ConnectionLost => return Err(RuntimeError::ConnectionLost),
        }
    }

    if session.cancellation().is_cancelled() || engine.cancellation().is_cancelled() {
        return Err(RuntimeError::Cancelled);
    }

    let ctx = ToolContext {
        tool_call_id: call.id.clone(),
        session_id: session.id().clone(),
        cancellation: engine.cancellation().clone(),
    };

    let _ = emitter.emit(RelayEvent::ToolStarted {
        session_id: session.id().clone(),
        tool_name: call.name.clone(),
    });
    debug!(tool_name = %call.name, tool_call_id = %call.id, "tool execution started");

    let result = match tool.execute(call.arguments.clone(), &ctx).await {
        Ok(result) => result,
        Err(e) => {
            warn!(tool_name = %call.name, error = %e, "tool execution failed");
            error_result(e.to_string())
        }
    };

    let _ = emitter.emit(RelayEvent::ToolCompleted {
        session_id: session.id().clone(),
        tool_name: call.name.clone(),
        is_error: result.is_error(),
    });

    Ok(result)
}
