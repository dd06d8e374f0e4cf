//! Tool schema, tool call, and tool result types.
//!
//! A tool is a named capability an engine exposes to the model. The schema is
//! sent to the model; the model replies with tool calls; execution produces
//! tool results that are fed back into the conversation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Tool schema
// ─────────────────────────────────────────────────────────────────────────────

/// JSON Schema-compatible parameter definition for a tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Top-level JSON Schema type.
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Property definitions (when type is `object`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Map<String, Value>>,
    /// Required property names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl ParameterSchema {
    /// An empty `object` schema (tool takes no arguments).
    #[must_use]
    pub fn empty_object() -> Self {
        Self {
            schema_type: "object".into(),
            properties: None,
            required: None,
        }
    }
}

/// A tool definition that can be sent to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name (unique identifier).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: ParameterSchema,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool call / result
// ─────────────────────────────────────────────────────────────────────────────

/// A model-requested invocation of a named tool with structured arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique id of this call within the turn.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Structured arguments.
    pub arguments: Value,
}

/// Result of a tool execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The tool output content.
    pub content: String,
    /// Whether the execution resulted in an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

/// Build a plain text tool result.
#[must_use]
pub fn text_result(content: impl Into<String>) -> ToolResult {
    ToolResult {
        content: content.into(),
        is_error: None,
    }
}

/// Build an error tool result.
#[must_use]
pub fn error_result(content: impl Into<String>) -> ToolResult {
    ToolResult {
        content: content.into(),
        is_error: Some(true),
    }
}

impl ToolResult {
    /// Whether this result represents an error.
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Routing context
// ─────────────────────────────────────────────────────────────────────────────

/// Where a confirmation prompt should be addressed on the client side
/// (e.g. which channel/user). Opaque to the relay; echoed into every
/// confirmation round trip.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingContext {
    /// Channel to address (client-defined meaning).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// User to address (client-defined meaning).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_schema_serde() {
        let schema = ToolSchema {
            name: "create_task".into(),
            description: "Create a task".into(),
            parameters: ParameterSchema {
                schema_type: "object".into(),
                properties: Some(
                    json!({"title": {"type": "string"}})
                        .as_object()
                        .unwrap()
                        .clone(),
                ),
                required: Some(vec!["title".into()]),
            },
        };
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["parameters"]["type"], "object");
        assert_eq!(json["parameters"]["required"][0], "title");
        let back: ToolSchema = serde_json::from_value(json).unwrap();
        assert_eq!(schema, back);
    }

    #[test]
    fn empty_object_schema() {
        let schema = ParameterSchema::empty_object();
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json, json!({"type": "object"}));
    }

    #[test]
    fn tool_call_serde() {
        let call = ToolCall {
            id: "tc-1".into(),
            name: "create_task".into(),
            arguments: json!({"title": "Write report"}),
        };
        let json = serde_json::to_string(&call).unwrap();
        let back: ToolCall = serde_json::from_str(&json).unwrap();
        assert_eq!(call, back);
    }

    #[test]
    fn text_result_is_not_error() {
        let result = text_result("done");
        assert!(!result.is_error());
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("is_error").is_none());
    }

    #[test]
    fn error_result_is_error() {
        let result = error_result("tool exploded");
        assert!(result.is_error());
        assert_eq!(result.content, "tool exploded");
    }

    #[test]
    fn routing_context_defaults_empty() {
        let routing = RoutingContext::default();
        let json = serde_json::to_value(&routing).unwrap();
        assert_eq!(json, json!({}));
    }

    #[test]
    fn routing_context_serde() {
        let routing = RoutingContext {
            channel: Some("C123".into()),
            user: Some("U456".into()),
        };
        let json = serde_json::to_value(&routing).unwrap();
        assert_eq!(json["channel"], "C123");
        assert_eq!(json["user"], "U456");
    }
}
