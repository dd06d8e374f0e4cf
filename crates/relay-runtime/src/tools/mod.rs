//! The tool system: the [`EngineTool`] trait and the per-engine registry.

pub mod registry;

pub use registry::ToolRegistry;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use relay_core::ids::SessionId;
use relay_core::tools::{ToolResult, ToolSchema};

/// Execution context passed to every tool invocation.
#[derive(Clone, Debug)]
pub struct ToolContext {
    /// Unique id of this tool call.
    pub tool_call_id: String,
    /// Session the invoking engine is linked to.
    pub session_id: SessionId,
    /// Cancellation token — fired when the engine is torn down or the
    /// session closes. Long-running tools should watch it.
    pub cancellation: CancellationToken,
}

/// Tool execution failure. Converted into an error tool result by the loop,
/// never propagated out of the turn.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The arguments did not match the tool's schema.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool's own work failed.
    #[error("{0}")]
    Execution(String),
}

/// The trait every engine tool implements.
///
/// The `requires_confirmation` flag is the static policy bit the loop uses
/// to decide whether a call needs a human confirmation round trip before
/// executing.
#[async_trait]
pub trait EngineTool: Send + Sync {
    /// Tool name — the exact string sent to/from the model.
    fn name(&self) -> &str;

    /// Generate the schema sent to the model.
    fn schema(&self) -> ToolSchema;

    /// Whether this tool must be confirmed by a human before executing.
    fn requires_confirmation(&self) -> bool {
        false
    }

    /// Human-readable description of a specific call, shown in the
    /// confirmation prompt.
    fn confirmation_prompt(&self, _arguments: &Value) -> String {
        format!("Approve running `{}`?", self.name())
    }

    /// Execute the tool with JSON arguments.
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError>;
}
