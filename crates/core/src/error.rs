//! Error types for the ironloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions. [`Error`] is the
//! run-level taxonomy: every variant carries a human-readable message and
//! a free-form details map so callers can branch on structured data
//! (e.g. how far a budget was overrun) instead of parsing strings.

use serde_json::{Map, Value};
use thiserror::Error;

/// Structured details attached to an [`Error`].
pub type Details = Map<String, Value>;

/// The top-level error type for a run.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String, details: Details },

    #[error("Prompt error: {message}")]
    Prompt { message: String, details: Details },

    #[error("Schema error: {message}")]
    Schema { message: String, details: Details },

    /// Model-client failures, and the max-iterations limit.
    #[error("LLM error: {message}")]
    Llm { message: String, details: Details },

    #[error("Parse error: {message}")]
    Parse { message: String, details: Details },

    #[error("Hook error: {message}")]
    Hook { message: String, details: Details },

    #[error("Validation error: {message}")]
    Validation { message: String, details: Details },

    #[error("Budget error: {message}")]
    Budget { message: String, details: Details },

    /// A tool failure surfaced because the run is configured to halt on error.
    #[error("Tool error: {message}")]
    Tool { message: String, details: Details },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Discriminant of [`Error`], for matching without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Prompt,
    Schema,
    Llm,
    Parse,
    Hook,
    Validation,
    Budget,
    Tool,
}

impl ErrorKind {
    /// The wire name of this kind (`"budget_error"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config_error",
            Self::Prompt => "prompt_error",
            Self::Schema => "schema_error",
            Self::Llm => "llm_error",
            Self::Parse => "parse_error",
            Self::Hook => "hook_error",
            Self::Validation => "validation_error",
            Self::Budget => "budget_error",
            Self::Tool => "tool_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    fn parts(&self) -> (ErrorKind, &str, &Details) {
        match self {
            Self::Config { message, details } => (ErrorKind::Config, message, details),
            Self::Prompt { message, details } => (ErrorKind::Prompt, message, details),
            Self::Schema { message, details } => (ErrorKind::Schema, message, details),
            Self::Llm { message, details } => (ErrorKind::Llm, message, details),
            Self::Parse { message, details } => (ErrorKind::Parse, message, details),
            Self::Hook { message, details } => (ErrorKind::Hook, message, details),
            Self::Validation { message, details } => (ErrorKind::Validation, message, details),
            Self::Budget { message, details } => (ErrorKind::Budget, message, details),
            Self::Tool { message, details } => (ErrorKind::Tool, message, details),
        }
    }

    fn details_mut(&mut self) -> &mut Details {
        match self {
            Self::Config { details, .. }
            | Self::Prompt { details, .. }
            | Self::Schema { details, .. }
            | Self::Llm { details, .. }
            | Self::Parse { details, .. }
            | Self::Hook { details, .. }
            | Self::Validation { details, .. }
            | Self::Budget { details, .. }
            | Self::Tool { details, .. } => details,
        }
    }

    /// Build an error of the given kind with no details.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let details = Details::new();
        match kind {
            ErrorKind::Config => Self::Config { message, details },
            ErrorKind::Prompt => Self::Prompt { message, details },
            ErrorKind::Schema => Self::Schema { message, details },
            ErrorKind::Llm => Self::Llm { message, details },
            ErrorKind::Parse => Self::Parse { message, details },
            ErrorKind::Hook => Self::Hook { message, details },
            ErrorKind::Validation => Self::Validation { message, details },
            ErrorKind::Budget => Self::Budget { message, details },
            ErrorKind::Tool => Self::Tool { message, details },
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Llm, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn hook(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Hook, message)
    }

    /// Attach a structured detail, replacing any previous value under `key`.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details_mut().insert(key.into(), value.into());
        self
    }

    /// The token budget was exhausted under the `halt` strategy.
    pub fn budget_exceeded(cumulative_tokens: u64, token_budget: u64) -> Self {
        let exceeded_by = cumulative_tokens.saturating_sub(token_budget);
        Self::new(
            ErrorKind::Budget,
            format!("token budget exceeded: {cumulative_tokens} tokens used of {token_budget}"),
        )
        .with_detail("cumulative_tokens", cumulative_tokens)
        .with_detail("token_budget", token_budget)
        .with_detail("exceeded_by", exceeded_by)
    }

    /// The run hit its iteration ceiling. Always fatal.
    pub fn max_iterations_exceeded(max_iterations: u32) -> Self {
        Self::llm(format!("max iterations exceeded ({max_iterations})"))
            .with_detail("max_iterations", max_iterations)
    }

    pub fn kind(&self) -> ErrorKind {
        self.parts().0
    }

    pub fn message(&self) -> &str {
        self.parts().1
    }

    pub fn details(&self) -> &Details {
        self.parts().2
    }
}

// --- Bounded context errors ---

/// Failures reported by a model-client collaborator.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ModelError> for Error {
    fn from(err: ModelError) -> Self {
        let error = Error::llm(err.to_string());
        match err {
            ModelError::ApiError { status_code, .. } => error.with_detail("status_code", status_code),
            ModelError::RateLimited { retry_after_secs } => {
                error.with_detail("retry_after_secs", retry_after_secs)
            }
            _ => error,
        }
    }
}

/// Failures raised while invoking a single tool.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
