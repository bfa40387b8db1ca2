//! Tool trait: the abstraction over callable capabilities.
//!
//! The loop never knows what a tool does. It resolves a requested
//! [`ToolCall`] by name against a [`ToolRegistry`], hands the tool its
//! arguments plus the call-scoped [`ExecutionFrame`], and gets back a
//! [`ToolOutcome`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::ToolError;

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON object
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// What a tool invocation produced.
///
/// `Halt` is a termination signal, not a flavour of success: the loop stops
/// immediately and returns the payload as the final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "payload", rename_all = "snake_case")]
pub enum ToolOutcome {
    #[serde(rename = "ok")]
    Success(Value),
    #[serde(rename = "error")]
    Failure(Value),
    Halt(Value),
}

impl ToolOutcome {
    pub fn payload(&self) -> &Value {
        match self {
            Self::Success(v) | Self::Failure(v) | Self::Halt(v) => v,
        }
    }

    fn status(&self) -> &'static str {
        match self {
            Self::Success(_) => "ok",
            Self::Failure(_) => "error",
            Self::Halt(_) => "halt",
        }
    }
}

/// The normalized result of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// The tool that produced it
    pub name: String,

    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn new(call_id: impl Into<String>, name: impl Into<String>, outcome: ToolOutcome) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            outcome,
        }
    }

    /// Shorthand for an error-shaped result with a message payload.
    pub fn failure(call_id: impl Into<String>, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(call_id, name, ToolOutcome::Failure(Value::String(message.into())))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Failure(_))
    }

    pub fn is_halt(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Halt(_))
    }

    /// Render as the JSON object shown to the model.
    pub fn render(&self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert("id".into(), Value::String(self.call_id.clone()));
        obj.insert("name".into(), Value::String(self.name.clone()));
        obj.insert("status".into(), Value::String(self.outcome.status().into()));
        obj.insert("payload".into(), self.outcome.payload().clone());
        if self.is_halt() {
            obj.insert("completed".into(), Value::Bool(true));
        }
        Value::Object(obj)
    }
}

/// What a failing tool call does to the rest of its batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Record an error-shaped result and run the remaining calls
    #[default]
    Continue,
    /// Abort the batch and fail the run with the first failure
    Halt,
}

impl std::str::FromStr for OnError {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "halt" => Ok(Self::Halt),
            other => Err(format!("unknown on_error policy: {other} (expected \"continue\" or \"halt\")")),
        }
    }
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: Value,
}

/// Call-scoped data handed to every tool invocation.
///
/// Assembled by the loop for each run. Deliberately not part of the
/// Context, which must stay a serializable value.
#[derive(Debug, Clone, Default)]
pub struct ExecutionFrame {
    /// Name of the agent driving the run
    pub agent: String,

    /// Functional domain the agent operates in
    pub domain: Option<String>,

    /// Whoever the run acts on behalf of
    pub actor: Option<Value>,

    /// Tenant the run is scoped to
    pub tenant: Option<String>,

    /// Per-call timeout the executor enforces
    pub timeout: Option<Duration>,
}

impl ExecutionFrame {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            ..Self::default()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_actor(mut self, actor: Value) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// The core Tool trait.
///
/// Tools are registered in a [`ToolRegistry`] and resolved by name at call
/// time. Returning `Err` is for failures the tool could not express as a
/// payload; the executor turns those into error-shaped results too.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Invoke the tool with parsed arguments and the run's frame.
    async fn invoke(
        &self,
        arguments: Value,
        frame: &ExecutionFrame,
    ) -> std::result::Result<ToolOutcome, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, keyed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool definitions, sorted by name so requests are stable.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Resolve and invoke a tool call.
    ///
    /// `null` arguments are passed on as `{}`; any other non-object is
    /// rejected before the tool runs.
    pub async fn invoke(
        &self,
        call: &ToolCall,
        frame: &ExecutionFrame,
    ) -> std::result::Result<ToolOutcome, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        let arguments = match &call.arguments {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => call.arguments.clone(),
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "expected a JSON object, got {other}"
                )));
            }
        };
        tool.invoke(arguments, frame).await
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
