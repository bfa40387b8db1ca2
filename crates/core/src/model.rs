//! ModelClient trait: the abstraction over language-model backends.
//!
//! A model client knows how to send the flattened conversation plus the
//! available tool schemas to a model and bring back either a final answer
//! or a set of requested tool calls. Network clients live outside this
//! workspace; the loop only sees this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::TokenUsage;
use crate::error::ModelError;
use crate::message::Message;
use crate::tool::{ToolCall, ToolDefinition};

/// What the loop hands the model client on each pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The conversation messages
    pub messages: Vec<Message>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// A complete response from a model client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Text the model produced (may be empty alongside tool calls)
    #[serde(default)]
    pub content: String,

    /// Requested tool calls; empty means this is the final answer
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// A structured final answer, if the client already parsed one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<Value>,

    /// Token usage; some clients never report it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,

    /// Which model actually responded
    #[serde(default)]
    pub model: String,
}

impl ModelResponse {
    /// A final text answer.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// A response requesting tool calls.
    pub fn tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            ..Self::default()
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_answer(mut self, answer: Value) -> Self {
        self.answer = Some(answer);
        self
    }

    pub fn requests_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// How the final answer is read out of a response with no tool calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerFormat {
    /// The content string is the answer
    #[default]
    Text,
    /// The content must parse as JSON
    Json,
}

/// The model-client collaborator.
///
/// Retries of transient failures are the client's business; the loop treats
/// any `Err` as fatal for the run.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client.
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ModelRequest) -> std::result::Result<ModelResponse, ModelError>;
}
