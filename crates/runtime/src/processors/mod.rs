//! Result processors: shrink tool outputs before they re-enter the
//! context.
//!
//! Each processor is a pure `Vec<ToolResult> -> Vec<ToolResult>` transform
//! over successful payloads. Error-shaped and halt results pass through
//! untouched.

mod sample;
mod summarize;
mod truncate;

pub use sample::Sample;
pub use summarize::Summarize;
pub use truncate::{TRUNCATED_KEY, Truncate};

use ironloop_config::ProcessorConfig;
use ironloop_core::tool::{ToolOutcome, ToolResult};
use serde_json::Value;

pub trait ResultProcessor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Transform one successful payload.
    fn process_value(&self, value: Value) -> Value;

    /// Apply [`process_value`](Self::process_value) to every successful
    /// result, preserving order and names.
    fn process(&self, results: Vec<ToolResult>) -> Vec<ToolResult> {
        results
            .into_iter()
            .map(|result| match result.outcome {
                ToolOutcome::Success(value) => ToolResult {
                    outcome: ToolOutcome::Success(self.process_value(value)),
                    ..result
                },
                _ => result,
            })
            .collect()
    }
}

/// Build a processor from its `[[processors]]` entry.
pub fn from_config(config: &ProcessorConfig) -> Box<dyn ResultProcessor> {
    match config {
        ProcessorConfig::Truncate { max_size, marker } => {
            Box::new(Truncate::new(*max_size).with_marker(marker.clone()))
        }
        ProcessorConfig::Summarize {
            strategy,
            sample_size,
            max_summary_size,
        } => Box::new(
            Summarize::new(*strategy)
                .with_sample_size(*sample_size)
                .with_max_summary_size(*max_summary_size),
        ),
        ProcessorConfig::Sample { sample_size, strategy } => Box::new(Sample::new(*sample_size, *strategy)),
    }
}
