//! `final_answer`: lets the model end the run explicitly.
//!
//! Returns [`ToolOutcome::Halt`]; the loop stops after the current batch
//! and hands the payload back as the run's answer without another model
//! call.

use async_trait::async_trait;
use ironloop_core::error::ToolError;
use ironloop_core::tool::{ExecutionFrame, Tool, ToolOutcome};
use serde_json::{Value, json};

pub struct FinalAnswerTool;

#[async_trait]
impl Tool for FinalAnswerTool {
    fn name(&self) -> &str {
        "final_answer"
    }

    fn description(&self) -> &str {
        "Finish the task and return the final answer to the user. Call this once you are done."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "answer": {
                    "description": "The final answer; any JSON value"
                }
            },
            "required": ["answer"]
        })
    }

    async fn invoke(&self, arguments: Value, frame: &ExecutionFrame) -> Result<ToolOutcome, ToolError> {
        let answer = arguments
            .get("answer")
            .cloned()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'answer' argument".into()))?;

        tracing::debug!(agent = %frame.agent, "Final answer submitted");
        Ok(ToolOutcome::Halt(json!({ "answer": answer })))
    }
}
