//! Turn runner — drives one user turn through the model/tool loop.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use relay_core::tools::RoutingContext;

use crate::confirm::ConfirmationGateway;
use crate::engine::Engine;
use crate::errors::RuntimeError;
use crate::events::{EventEmitter, RelayEvent};
use crate::session::Session;

use super::tool_executor::execute_tool_call;
use super::{TurnOptions, TurnOutcome};

/// Run one user turn to completion.
///
/// The caller (the session manager) has already moved the session to
/// `Running` and restores it afterwards. The loop:
///
/// 1. appends the user message to the engine's conversation context,
/// 2. asks the provider for a completion given context + tool schemas,
/// 3. terminates with the completion text when no tool calls are returned,
/// 4. otherwise executes each tool call (confirmation-gated where the tool
///    requires it) and feeds the results back, then repeats,
///
/// bounded by `options.max_iterations` (`ToolLoopExceeded` when hit). Tool
/// failures stay inside the loop as error tool results; only `Cancelled` and
/// `ConnectionLost` abort the turn.
#[instrument(skip_all, fields(session_id = %session.id(), model = engine.provider().model()))]
pub async fn run_turn(
    session: &Arc<Session>,
    engine: &Arc<Engine>,
    prompt: &str,
    routing: &RoutingContext,
    gateway: &dyn ConfirmationGateway,
    options: &TurnOptions,
    emitter: &EventEmitter,
) -> Result<TurnOutcome, RuntimeError> {
    engine.with_context(|ctx| ctx.push_user(prompt));
    let _ = emitter.emit(RelayEvent::TurnStarted {
        session_id: session.id().clone(),
    });
    debug!("turn started");

    let tools = engine.tools().schemas();
    let mut iteration = 0u32;

    let result = loop {
        if session.cancellation().is_cancelled() {
            break Err(RuntimeError::Cancelled);
        }
        if iteration >= options.max_iterations {
            warn!(
                max_iterations = options.max_iterations,
                "tool loop exceeded iteration cap"
            );
            break Err(RuntimeError::ToolLoopExceeded(options.max_iterations));
        }
        iteration += 1;

        // Snapshot the context so no lock is held across the provider await.
        let snapshot = engine.context_snapshot();
        let completion = match engine.provider().complete(&snapshot, &tools).await {
            Ok(completion) => completion,
            Err(e) => break Err(RuntimeError::Provider(e)),
        };

        engine.with_context(|ctx| {
            ctx.push_assistant(completion.text.clone(), completion.tool_calls.clone());
        });

        if completion.tool_calls.is_empty() {
            info!(iterations = iteration, "turn completed");
            break Ok(TurnOutcome {
                text: completion.text,
                iterations: iteration,
            });
        }

        debug!(
            iteration,
            tool_calls = completion.tool_calls.len(),
            "executing tool calls"
        );
        let mut aborted = None;
        for call in &completion.tool_calls {
            match execute_tool_call(session, engine, call, routing, gateway, options, emitter)
                .await
            {
                Ok(result) => engine.with_context(|ctx| ctx.push_tool_result(call, result)),
                Err(e) => {
                    aborted = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = aborted {
            break Err(e);
        }
    };

    match &result {
        Ok(outcome) => {
            let _ = emitter.emit(RelayEvent::TurnCompleted {
                session_id: session.id().clone(),
                iterations: outcome.iterations,
            });
        }
        Err(e) => {
            warn!(error = %e, category = e.category(), "turn failed");
            let _ = emitter.emit(RelayEvent::TurnFailed {
                session_id: session.id().clone(),
                error: e.to_string(),
            });
        }
    }
    result
}
