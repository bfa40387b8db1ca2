//! Iteration hooks: fixed extension points in the loop.
//!
//! A hook implements whichever of the five callbacks it needs; the rest
//! default to pass-through. Any callback may return an error, which aborts
//! the run. That is how custom stop conditions are expressed without
//! touching the loop.
//!
//! | Callback | Called | Input |
//! |---|---|---|
//! | `on_iteration_start` | before the budget check | iteration number |
//! | `prepare_messages` | before every model call | flattened messages |
//! | `prepare_tool_results` | before results are folded in | raw results |
//! | `on_iteration_complete` | after results are folded in | iteration number, context |
//! | `prepare_context` | after `on_iteration_complete` | the context |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ironloop_core::context::Context;
use ironloop_core::error::{Error, Result};
use ironloop_core::event::{DomainEvent, EventBus};
use ironloop_core::message::Message;
use ironloop_core::tool::ToolResult;
use tracing::{debug, info};

use crate::compaction::ContextCompactor;
use crate::processors::ResultProcessor;

#[async_trait]
pub trait IterationHooks: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        "hook"
    }

    async fn on_iteration_start(&self, _iteration: u32) -> Result<()> {
        Ok(())
    }

    async fn prepare_messages(&self, messages: Vec<Message>) -> Result<Vec<Message>> {
        Ok(messages)
    }

    async fn prepare_tool_results(&self, results: Vec<ToolResult>) -> Result<Vec<ToolResult>> {
        Ok(results)
    }

    async fn on_iteration_complete(&self, _iteration: u32, _ctx: &Context) -> Result<()> {
        Ok(())
    }

    async fn prepare_context(&self, ctx: Context) -> Result<Context> {
        Ok(ctx)
    }
}

// ── Pipeline ────────────────────────────────────────────────────────

/// Runs hooks in registration order; each one's output feeds the next and
/// the first error short-circuits.
#[derive(Clone, Default)]
pub struct HookPipeline {
    hooks: Vec<Arc<dyn IterationHooks>>,
}

impl HookPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook to the pipeline.
    pub fn with(mut self, hook: impl IterationHooks + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn push(&mut self, hook: Arc<dyn IterationHooks>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[async_trait]
impl IterationHooks for HookPipeline {
    fn name(&self) -> &str {
        "pipeline"
    }

    async fn on_iteration_start(&self, iteration: u32) -> Result<()> {
        for hook in &self.hooks {
            hook.on_iteration_start(iteration).await?;
        }
        Ok(())
    }

    async fn prepare_messages(&self, mut messages: Vec<Message>) -> Result<Vec<Message>> {
        for hook in &self.hooks {
            messages = hook.prepare_messages(messages).await?;
        }
        Ok(messages)
    }

    async fn prepare_tool_results(&self, mut results: Vec<ToolResult>) -> Result<Vec<ToolResult>> {
        for hook in &self.hooks {
            results = hook.prepare_tool_results(results).await?;
        }
        Ok(results)
    }

    async fn on_iteration_complete(&self, iteration: u32, ctx: &Context) -> Result<()> {
        for hook in &self.hooks {
            hook.on_iteration_complete(iteration, ctx).await?;
        }
        Ok(())
    }

    async fn prepare_context(&self, mut ctx: Context) -> Result<Context> {
        for hook in &self.hooks {
            ctx = hook.prepare_context(ctx).await?;
        }
        Ok(ctx)
    }
}

// ── Built-in hooks ──────────────────────────────────────────────────

/// Applies result processors, in order, in `prepare_tool_results`.
pub struct ProcessorHook {
    processors: Vec<Box<dyn ResultProcessor>>,
}

impl ProcessorHook {
    pub fn new(processors: Vec<Box<dyn ResultProcessor>>) -> Self {
        Self { processors }
    }
}

#[async_trait]
impl IterationHooks for ProcessorHook {
    fn name(&self) -> &str {
        "processors"
    }

    async fn prepare_tool_results(&self, mut results: Vec<ToolResult>) -> Result<Vec<ToolResult>> {
        for processor in &self.processors {
            debug!(processor = processor.name(), results = results.len(), "Processing tool results");
            results = processor.process(results);
        }
        Ok(results)
    }
}

/// Runs a compactor in `prepare_context` and reports every pass as a
/// [`DomainEvent::ContextCompacted`].
pub struct CompactionHook {
    compactor: Box<dyn ContextCompactor>,
    event_bus: Option<Arc<EventBus>>,
}

impl CompactionHook {
    pub fn new(compactor: Box<dyn ContextCompactor>) -> Self {
        Self {
            compactor,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }
}

#[async_trait]
impl IterationHooks for CompactionHook {
    fn name(&self) -> &str {
        "compaction"
    }

    async fn prepare_context(&self, ctx: Context) -> Result<Context> {
        let (ctx, report) = self.compactor.compact(ctx);
        if report.removed > 0 {
            info!(
                context_id = %ctx.id,
                strategy = %report.strategy,
                removed = report.removed,
                remaining = report.after,
                "Pruned old iterations"
            );
        }
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ContextCompacted {
                strategy: report.strategy,
                before: report.before,
                after: report.after,
                removed: report.removed,
                timestamp: Utc::now(),
            });
        }
        Ok(ctx)
    }
}

/// Vetoes any iteration past `max`, regardless of what the model wants.
pub struct StopAfter {
    max: u32,
}

impl StopAfter {
    pub fn new(max: u32) -> Self {
        Self { max }
    }
}

#[async_trait]
impl IterationHooks for StopAfter {
    fn name(&self) -> &str {
        "stop_after"
    }

    async fn on_iteration_start(&self, iteration: u32) -> Result<()> {
        if iteration > self.max {
            return Err(Error::hook(format!("stopped after {} iterations", self.max))
                .with_detail("limit", self.max)
                .with_detail("iteration", iteration));
        }
        Ok(())
    }
}
