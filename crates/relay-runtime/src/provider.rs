//! Model provider abstraction.
//!
//! The actual LLM call is an external collaborator. Engines hold a
//! [`ModelProvider`] and the turn loop asks it for one completion per
//! iteration, given the conversation context and the engine's tool schemas.

use async_trait::async_trait;

use relay_core::tools::{ToolCall, ToolSchema};

use crate::context::ConversationContext;

/// One model completion: assistant text plus zero or more tool calls.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Completion {
    /// Assistant text (may be empty when the model only calls tools).
    pub text: String,
    /// Tool calls requested by the model.
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    /// A text-only completion.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A completion carrying tool calls.
    #[must_use]
    pub fn with_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            text: text.into(),
            tool_calls,
        }
    }
}

/// Model provider failure.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The request to the model failed (network, auth, rate limit).
    #[error("Model request failed: {0}")]
    Request(String),

    /// The model response could not be interpreted.
    #[error("Malformed model response: {0}")]
    Malformed(String),
}

/// A stateful conversation model.
///
/// Implementations wrap a concrete LLM API. The relay never inspects prompt
/// content; it only routes the context and tool schemas through.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// The model identifier (for logging).
    fn model(&self) -> &str;

    /// Produce one completion for the given context and tool schemas.
    async fn complete(
        &self,
        context: &ConversationContext,
        tools: &[ToolSchema],
    ) -> Result<Completion, ProviderError>;
}
