//! Engines — stateful tool-using conversation processors linked to sessions.

pub mod catalog;
pub mod link_manager;

pub use catalog::{EngineCatalog, EngineFactory};
pub use link_manager::EngineLinkManager;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use relay_core::ids::{EngineId, SessionId};

use crate::context::ConversationContext;
use crate::provider::ModelProvider;
use crate::tools::ToolRegistry;

/// A stateful engine instance linked to exactly one session.
///
/// The engine holds its session id as a plain back-reference, never a handle,
/// so ownership stays acyclic: the session (through the link manager) owns
/// the engine, the engine only knows its session's name.
pub struct Engine {
    id: EngineId,
    engine_type: String,
    session_id: SessionId,
    provider: Arc<dyn ModelProvider>,
    tools: ToolRegistry,
    context: Mutex<ConversationContext>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.id)
            .field("engine_type", &self.engine_type)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create a new engine instance.
    pub fn new(
        engine_type: impl Into<String>,
        session_id: SessionId,
        provider: Arc<dyn ModelProvider>,
        tools: ToolRegistry,
        context: ConversationContext,
    ) -> Self {
        Self {
            id: EngineId::new(),
            engine_type: engine_type.into(),
            session_id,
            provider,
            tools,
            context: Mutex::new(context),
            cancel: CancellationToken::new(),
        }
    }

    /// Engine id.
    pub fn id(&self) -> &EngineId {
        &self.id
    }

    /// Engine type name.
    pub fn engine_type(&self) -> &str {
        &self.engine_type
    }

    /// The session this engine is linked to (back-reference only).
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// The model provider.
    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    /// The tool registry built at link time.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Cancellation token fired on teardown. In-flight tool calls observe it
    /// through their [`crate::tools::ToolContext`].
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Snapshot the conversation context for a model call.
    ///
    /// The lock is never held across an await point; providers get a clone.
    pub fn context_snapshot(&self) -> ConversationContext {
        self.context.lock().clone()
    }

    /// Mutate the conversation context.
    pub fn with_context<R>(&self, f: impl FnOnce(&mut ConversationContext) -> R) -> R {
        f(&mut self.context.lock())
    }

    /// Tear down the engine: cancel in-flight tool calls and release the
    /// conversation. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether the engine has been torn down.
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
