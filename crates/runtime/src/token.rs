//! Token estimation utilities.
//!
//! Character-based heuristic: ~4 characters per token, counted in Unicode
//! scalar values and floored, matching
//! [`Context::estimate_token_count`](ironloop_core::Context::estimate_token_count).
//! Good for sizing decisions and log lines, never for accounting.

use ironloop_core::message::Message;
use ironloop_core::tool::ToolDefinition;
use serde_json::Value;

const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// Estimate tokens for a JSON value in its compact serialized form.
pub fn estimate_value_tokens(value: &Value) -> usize {
    match value {
        Value::String(s) => estimate_tokens(s),
        other => estimate_tokens(&other.to_string()),
    }
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(Message::char_count).sum::<usize>() / CHARS_PER_TOKEN
}

/// Estimate tokens for the tool schemas sent alongside a request.
pub fn estimate_tools_tokens(tools: &[ToolDefinition]) -> usize {
    tools
        .iter()
        .map(|t| estimate_tokens(&t.name) + estimate_tokens(&t.description) + estimate_value_tokens(&t.parameters))
        .sum()
}
