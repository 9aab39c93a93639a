//! Tool data model shared by the registry, the domain servers and the LLM client.

pub mod args;
pub mod registry;

pub use args::ToolArgs;
pub use registry::ToolRegistry;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

/// The uniform envelope every tool execution returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ToolResult {
    pub fn success(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: ToolStatus::Success,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            message: message.into(),
            details: None,
        }
    }

    /// An error that still has something to report, e.g. a resource created
    /// before a follow-up call failed.
    pub fn error_with_details(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: ToolStatus::Error,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }
}

/// Declarative description of one tool, handed to the LLM as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// A tool invocation requested by the LLM. `arguments` is the raw JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// The result of one tool call, correlated by call id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: ToolResult,
}
