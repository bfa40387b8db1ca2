//! The iteration loop: the heart of ironloop.
//!
//! Each run follows a bounded **model call → tool execution → context
//! update** cycle:
//!
//! 1. **Start** a [`Context`](ironloop_core::Context) from the user input
//! 2. **Check** hooks and the token budget at every iteration boundary
//! 3. **Call** the model client with the flattened conversation
//! 4. **If tool calls**: execute them sequentially, post-process the
//!    results, fold them in, compact, and loop back to step 2
//! 5. **If no tool calls**: parse the final answer and return
//!
//! The loop also stops when a tool returns a halt signal, when the
//! iteration ceiling is reached, or when a hook or the budget vetoes.

pub mod compaction;
pub mod executor;
pub mod hooks;
pub mod loop_runner;
pub mod processors;
pub mod token;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use compaction::{CompactionReport, ContextCompactor, SlidingWindow, TokenBased};
pub use executor::ToolExecutor;
pub use hooks::{CompactionHook, HookPipeline, IterationHooks, ProcessorHook, StopAfter};
pub use loop_runner::{AgentLoop, RunOutcome, StopReason};
pub use processors::{ResultProcessor, Sample, Summarize, Truncate};
