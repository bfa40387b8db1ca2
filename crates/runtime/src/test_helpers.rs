//! Shared test helpers: a scripted model client and a few tiny tools.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ironloop_core::context::TokenUsage;
use ironloop_core::error::{ModelError, ToolError};
use ironloop_core::model::{ModelClient, ModelRequest, ModelResponse};
use ironloop_core::tool::{ExecutionFrame, Tool, ToolCall, ToolOutcome, ToolRegistry};
use serde_json::{Value, json};

/// A model client that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request. Panics if more calls are made than responses
/// provided.
pub struct SequentialMockModel {
    responses: Mutex<Vec<ModelResponse>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl SequentialMockModel {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// The same tool-call response, forever (well, `times` times).
    pub fn always_tool(name: &str, args: Value, times: usize) -> Self {
        Self::new(
            (0..times)
                .map(|i| tool_response(vec![ToolCall::new(format!("call_{i}"), name, args.clone())], 10))
                .collect(),
        )
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for SequentialMockModel {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let index = requests.len();

        if index >= responses.len() {
            panic!(
                "SequentialMockModel: no more responses (call #{}, have {})",
                index,
                responses.len()
            );
        }

        requests.push(request);
        Ok(responses[index].clone())
    }
}

/// A final text answer with `total` tokens of usage.
pub fn text_response(text: &str, total: u64) -> ModelResponse {
    ModelResponse::text(text).with_usage(usage(total))
}

/// A tool-call response with `total` tokens of usage.
pub fn tool_response(calls: Vec<ToolCall>, total: u64) -> ModelResponse {
    ModelResponse::tool_calls("", calls).with_usage(usage(total))
}

/// Split `total` roughly 2:1 between input and output.
pub fn usage(total: u64) -> TokenUsage {
    let output = total / 3;
    TokenUsage::new(total - output, output)
}

pub fn registry_with(tools: Vec<Box<dyn Tool>>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool);
    }
    registry
}

fn object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// Echoes its arguments back, plus the agent name from the frame.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Echo the arguments"
    }
    fn parameters_schema(&self) -> Value {
        object_schema()
    }
    async fn invoke(&self, arguments: Value, frame: &ExecutionFrame) -> Result<ToolOutcome, ToolError> {
        Ok(ToolOutcome::Success(json!({"args": arguments, "agent": frame.agent})))
    }
}

/// Reports the actor it was called on behalf of.
pub struct WhoAmITool;

#[async_trait]
impl Tool for WhoAmITool {
    fn name(&self) -> &str {
        "whoami"
    }
    fn description(&self) -> &str {
        "Return the calling actor"
    }
    fn parameters_schema(&self) -> Value {
        object_schema()
    }
    async fn invoke(&self, _arguments: Value, frame: &ExecutionFrame) -> Result<ToolOutcome, ToolError> {
        Ok(ToolOutcome::Success(json!({"actor": frame.actor.clone()})))
    }
}

/// Always returns an error payload.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "failing"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn parameters_schema(&self) -> Value {
        object_schema()
    }
    async fn invoke(&self, _arguments: Value, _frame: &ExecutionFrame) -> Result<ToolOutcome, ToolError> {
        Ok(ToolOutcome::Failure(json!({"reason": "always fails"})))
    }
}

/// Halts the run with `{answer}`.
pub struct HaltTool;

#[async_trait]
impl Tool for HaltTool {
    fn name(&self) -> &str {
        "halt"
    }
    fn description(&self) -> &str {
        "Stop with an answer"
    }
    fn parameters_schema(&self) -> Value {
        object_schema()
    }
    async fn invoke(&self, arguments: Value, _frame: &ExecutionFrame) -> Result<ToolOutcome, ToolError> {
        Ok(ToolOutcome::Halt(json!({"answer": arguments["answer"].clone()})))
    }
}

/// Sleeps for a minute before answering.
pub struct SleepyTool;

#[async_trait]
impl Tool for SleepyTool {
    fn name(&self) -> &str {
        "sleepy"
    }
    fn description(&self) -> &str {
        "Takes its time"
    }
    fn parameters_schema(&self) -> Value {
        object_schema()
    }
    async fn invoke(&self, _arguments: Value, _frame: &ExecutionFrame) -> Result<ToolOutcome, ToolError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(ToolOutcome::Success(json!("done")))
    }
}

/// Returns a list of `n` strings.
pub struct ListTool(pub usize);

#[async_trait]
impl Tool for ListTool {
    fn name(&self) -> &str {
        "list"
    }
    fn description(&self) -> &str {
        "Return a long list"
    }
    fn parameters_schema(&self) -> Value {
        object_schema()
    }
    async fn invoke(&self, _arguments: Value, _frame: &ExecutionFrame) -> Result<ToolOutcome, ToolError> {
        Ok(ToolOutcome::Success(json!(
            (0..self.0).map(|i| format!("item-{i}")).collect::<Vec<_>>()
        )))
    }
}
