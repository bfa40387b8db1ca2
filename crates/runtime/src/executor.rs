//! Tool executor: resolves requested calls against the registry and
//! normalizes whatever comes back into [`ToolResult`]s.
//!
//! Calls run one at a time, in the order the model requested them. A
//! failing call becomes an error-shaped result; under [`OnError::Halt`] the
//! first failure aborts the batch and fails the run instead.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use ironloop_core::error::{Error, ErrorKind, ToolError};
use ironloop_core::event::{DomainEvent, EventBus};
use ironloop_core::tool::{ExecutionFrame, OnError, ToolCall, ToolOutcome, ToolRegistry, ToolResult};
use serde_json::Value;
use tracing::{debug, warn};

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    on_error: OnError,
    event_bus: Arc<EventBus>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            on_error: OnError::default(),
            event_bus,
        }
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    /// Execute a batch sequentially.
    ///
    /// Stops early after a halt outcome; calls after it are not run.
    pub async fn execute_all(
        &self,
        calls: &[ToolCall],
        frame: &ExecutionFrame,
    ) -> Result<Vec<ToolResult>, Error> {
        let mut results = Vec::with_capacity(calls.len());

        for (index, call) in calls.iter().enumerate() {
            let result = self.execute(call, frame).await;

            if result.is_failure() && self.on_error == OnError::Halt {
                warn!(
                    tool = %call.name,
                    call_id = %call.id,
                    skipped = calls.len() - index - 1,
                    "Tool failed under on_error = halt, aborting batch"
                );
                return Err(Error::new(
                    ErrorKind::Tool,
                    format!("tool '{}' failed", call.name),
                )
                .with_detail("tool", call.name.clone())
                .with_detail("call_id", call.id.clone())
                .with_detail("payload", result.outcome.payload().clone()));
            }

            let halted = result.is_halt();
            results.push(result);

            if halted {
                if index + 1 < calls.len() {
                    debug!(
                        tool = %call.name,
                        skipped = calls.len() - index - 1,
                        "Halt signal received, skipping remaining calls"
                    );
                }
                break;
            }
        }

        Ok(results)
    }

    /// Execute one call. Never fails: every problem becomes an error-shaped
    /// result.
    pub async fn execute(&self, call: &ToolCall, frame: &ExecutionFrame) -> ToolResult {
        let start = Instant::now();
        let outcome = match self.invoke(call, frame).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolOutcome::Failure(Value::String(e.to_string()))
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = ToolResult::new(call.id.clone(), call.name.clone(), outcome);
        debug!(
            tool = %call.name,
            call_id = %call.id,
            failed = result.is_failure(),
            halted = result.is_halt(),
            duration_ms,
            "Tool executed"
        );

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: !result.is_failure(),
            halted: result.is_halt(),
            duration_ms,
            timestamp: Utc::now(),
        });

        result
    }

    async fn invoke(&self, call: &ToolCall, frame: &ExecutionFrame) -> Result<ToolOutcome, ToolError> {
        let invocation = self.registry.invoke(call, frame);
        let Some(timeout) = frame.timeout else {
            return invocation.await;
        };

        tokio::time::timeout(timeout, invocation)
            .await
            .map_err(|_| ToolError::Timeout {
                tool_name: call.name.clone(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })?
    }
}
