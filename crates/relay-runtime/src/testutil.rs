//! Scripted test doubles for providers, tools, factories, and gateways.
//!
//! Shared by the unit tests in this crate and by downstream integration
//! tests; not part of the stable API.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use relay_core::ids::SessionId;
use relay_core::tools::{text_result, ParameterSchema, ToolResult, ToolSchema};

use crate::confirm::{ConfirmationGateway, ConfirmationOutcome, ConfirmationRequest};
use crate::context::ConversationContext;
use crate::engine::{Engine, EngineFactory};
use crate::errors::RuntimeError;
use crate::provider::{Completion, ModelProvider, ProviderError};
use crate::tools::{EngineTool, ToolContext, ToolError, ToolRegistry};

// ─────────────────────────────────────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────────────────────────────────────

enum Script {
    Queue(VecDeque<Completion>),
    Loop(Completion),
    Fail(String),
}

/// A model provider that replays a scripted sequence of completions.
pub struct ScriptedProvider {
    script: Mutex<Script>,
}

impl ScriptedProvider {
    /// No scripted completions; every call returns an empty text completion.
    pub fn empty() -> Self {
        Self::with_completions(vec![])
    }

    /// Replay the given completions in order, then empty text completions.
    pub fn with_completions(completions: Vec<Completion>) -> Self {
        Self {
            script: Mutex::new(Script::Queue(completions.into())),
        }
    }

    /// Return the same completion on every call.
    pub fn looping(completion: Completion) -> Self {
        Self {
            script: Mutex::new(Script::Loop(completion)),
        }
    }

    /// Fail every call with a request error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(Script::Fail(message.into())),
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _context: &ConversationContext,
        _tools: &[ToolSchema],
    ) -> Result<Completion, ProviderError> {
        match &mut *self.script.lock() {
            Script::Queue(queue) => Ok(queue.pop_front().unwrap_or_default()),
            Script::Loop(completion) => Ok(completion.clone()),
            Script::Fail(message) => Err(ProviderError::Request(message.clone())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

/// A tool that records its invocations and returns a canned result.
pub struct RecordingTool {
    name: String,
    requires_confirmation: bool,
    fail: bool,
    calls: Mutex<Vec<Value>>,
}

impl RecordingTool {
    /// A non-confirmation tool named `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            requires_confirmation: false,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Mark the tool as requiring confirmation.
    #[must_use]
    pub fn confirmed(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    /// Make every execution fail.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Number of times the tool actually executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// The recorded argument values.
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl EngineTool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: format!("Test tool {}", self.name),
            parameters: ParameterSchema::empty_object(),
        }
    }

    fn requires_confirmation(&self) -> bool {
        self.requires_confirmation
    }

    async fn execute(&self, arguments: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        if self.fail {
            return Err(ToolError::Execution(format!("{} blew up", self.name)));
        }
        self.calls.lock().push(arguments);
        Ok(text_result(format!("{} executed", self.name)))
    }
}

/// Build a registry holding the given recording tools.
pub fn tool_registry_with(tools: Vec<Arc<RecordingTool>>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool);
    }
    registry
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine factory
// ─────────────────────────────────────────────────────────────────────────────

/// A factory that builds engines around a shared provider and a fixed tool
/// set.
pub struct StaticFactory {
    engine_type: String,
    provider: Arc<dyn ModelProvider>,
    tools: Mutex<Vec<Arc<RecordingTool>>>,
    fail: bool,
}

impl StaticFactory {
    /// A factory for `engine_type` over `provider` with no tools.
    pub fn new(engine_type: &str, provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            engine_type: engine_type.to_owned(),
            provider,
            tools: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// Add a tool to every engine this factory builds.
    #[must_use]
    pub fn with_tool(self, tool: Arc<RecordingTool>) -> Self {
        self.tools.lock().push(tool);
        self
    }

    /// Make `build` fail (for link-error paths).
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl EngineFactory for StaticFactory {
    fn engine_type(&self) -> &str {
        &self.engine_type
    }

    async fn build(&self, session_id: &SessionId) -> Result<Engine, RuntimeError> {
        if self.fail {
            return Err(RuntimeError::EngineLink(format!(
                "Factory for {} refused to build",
                self.engine_type
            )));
        }
        let mut registry = ToolRegistry::new();
        for tool in self.tools.lock().iter() {
            registry.register(tool.clone());
        }
        Ok(Engine::new(
            self.engine_type.clone(),
            session_id.clone(),
            self.provider.clone(),
            registry,
            ConversationContext::new(),
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Confirmation gateways
// ─────────────────────────────────────────────────────────────────────────────

/// A gateway that records requests and resolves them with a fixed outcome.
pub struct StaticGateway {
    outcome: ConfirmationOutcome,
    requests: Mutex<Vec<ConfirmationRequest>>,
}

impl StaticGateway {
    /// A gateway that approves everything.
    pub fn approving() -> Arc<Self> {
        Self::with_outcome(ConfirmationOutcome::Confirmed)
    }

    /// A gateway that always resolves with `outcome`.
    pub fn with_outcome(outcome: ConfirmationOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Number of round trips issued.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// The recorded requests.
    pub fn requests(&self) -> Vec<ConfirmationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ConfirmationGateway for StaticGateway {
    async fn confirm(
        &self,
        request: ConfirmationRequest,
        _cancel: &CancellationToken,
    ) -> ConfirmationOutcome {
        self.requests.lock().push(request);
        self.outcome
    }
}

/// A gateway that never answers: it parks on the session's cancellation
/// token and resolves to `Cancelled` when it fires. Used to exercise
/// close-mid-confirmation paths.
pub struct HangingGateway {
    requests: Mutex<usize>,
}

impl HangingGateway {
    /// Create a hanging gateway.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(0),
        })
    }

    /// Wait until at least one round trip has been issued.
    pub async fn wait_for_request(&self) {
        loop {
            if *self.requests.lock() > 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl ConfirmationGateway for HangingGateway {
    async fn confirm(
        &self,
        _request: ConfirmationRequest,
        cancel: &CancellationToken,
    ) -> ConfirmationOutcome {
        *self.requests.lock() += 1;
        cancel.cancelled().await;
        ConfirmationOutcome::Cancelled
    }
}
