//! Message domain types.
//!
//! Messages are the unit the model client sees: the loop flattens a
//! [`Context`](crate::context::Context) into an ordered list of these
//! before every model call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::{ToolCall, ToolResult};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// Results of the tool calls requested by the preceding assistant message
    ToolResult,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(Role::Assistant, content)
        }
    }

    /// Create the tool-result message folding a batch of results back in.
    ///
    /// Content is a JSON array of `{id, name, status, payload}` objects, one
    /// per result, in execution order.
    pub fn tool_results(results: &[ToolResult]) -> Self {
        let rendered: Vec<serde_json::Value> = results.iter().map(ToolResult::render).collect();
        let content = serde_json::Value::Array(rendered).to_string();
        Self::with_role(Role::ToolResult, content)
    }

    /// Character count of the content (Unicode scalar values, not bytes).
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}
