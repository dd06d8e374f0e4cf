//! Conversation context — the ordered sequence of turns an engine carries.

use serde::{Deserialize, Serialize};

use relay_core::tools::{ToolCall, ToolResult};

/// One entry in the conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    /// A user message.
    User {
        /// Message text.
        text: String,
    },
    /// An assistant message, possibly carrying tool calls.
    Assistant {
        /// Assistant text.
        text: String,
        /// Tool calls requested in this message.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// The result of one tool call, fed back to the model.
    ToolResult {
        /// Id of the tool call this result answers.
        tool_call_id: String,
        /// Tool name.
        tool_name: String,
        /// Execution result.
        result: ToolResult,
    },
}

/// Ordered conversation history plus an optional system prompt.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// System prompt, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    turns: Vec<Turn>,
}

impl ConversationContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty context with a system prompt.
    #[must_use]
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(prompt.into()),
            turns: Vec::new(),
        }
    }

    /// Append a user message.
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::User { text: text.into() });
    }

    /// Append an assistant message with its tool calls.
    pub fn push_assistant(&mut self, text: impl Into<String>, tool_calls: Vec<ToolCall>) {
        self.turns.push(Turn::Assistant {
            text: text.into(),
            tool_calls,
        });
    }

    /// Append a tool result keyed by its originating call.
    pub fn push_tool_result(&mut self, call: &ToolCall, result: ToolResult) {
        self.turns.push(Turn::ToolResult {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result,
        });
    }

    /// All turns in order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the context holds no turns.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop all turns, keeping the system prompt.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
